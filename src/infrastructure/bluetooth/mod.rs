//! Bluetooth Module
//!
//! Discovery and connection-state tracking for SenStick peripherals.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Coordinator                         │
//! │  (process-wide owner of the adapter, public API)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌────────────┐ ┌────────────┐ ┌────────────┐
//! │    Scan    │ │  Adapter   │ │  Protocol  │
//! │            │ │            │ │            │
//! │ - countdown│ │ - trait    │ │ - UUIDs    │
//! │ - progress │ │ - mock     │ │            │
//! │            │ │ - btleplug │ │            │
//! └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`adapter`] - Radio adapter capability consumed by the coordinator
//! - [`coordinator`] - Device discovery & connection coordinator
//! - [`scan`] - Time-bounded scan sessions
//! - [`protocol`] - SenStick advertising identifiers
//! - [`mock`] - Scriptable in-memory adapter

pub mod adapter;
#[cfg(feature = "btleplug")]
pub mod btleplug_adapter;
pub mod coordinator;
pub mod mock;
pub mod protocol;
pub mod scan;

// Re-export main service for convenience
pub use adapter::{AdapterError, EventSink, RadioAdapter};
#[cfg(feature = "btleplug")]
pub use btleplug_adapter::BtleplugAdapter;
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError};
pub use mock::MockAdapter;
