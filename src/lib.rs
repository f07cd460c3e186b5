//! SenStick device discovery and connection coordination.
//!
//! The [`Coordinator`] owns the radio adapter, runs time-bounded scans and
//! keeps a deduplicated, observable list of discovered [`Device`]s.

pub mod domain;
pub mod infrastructure;

pub use domain::device::Device;
pub use domain::models::{
    AdapterEvent, AdapterState, ConnectionState, CoordinatorEvent, DeviceId, PeripheralInfo,
    ScanRejection,
};
pub use domain::registry::DeviceSnapshot;
pub use domain::settings::{LogSettings, Settings, SettingsService};
pub use infrastructure::bluetooth::scan::ProgressCallback;
pub use infrastructure::bluetooth::{
    AdapterError, Coordinator, CoordinatorConfig, CoordinatorError, EventSink, MockAdapter,
    RadioAdapter,
};
#[cfg(feature = "btleplug")]
pub use infrastructure::bluetooth::BtleplugAdapter;
