pub mod device;
pub mod models;
pub mod registry;
pub mod settings;
