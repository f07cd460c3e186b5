//! Radio Adapter Capability
//!
//! The coordinator consumes the platform radio stack through this trait.
//! Implementations push everything they observe into the currently attached
//! [`EventSink`]; whoever attached last receives the events.

use crate::domain::models::{AdapterEvent, AdapterState, DeviceId, PeripheralInfo};
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Receiving end of adapter events
pub type EventSink = mpsc::UnboundedSender<AdapterEvent>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("adapter unavailable (state: {0})")]
    Unavailable(AdapterState),

    #[error("unknown peripheral: {0}")]
    UnknownPeripheral(DeviceId),

    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("adapter backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait RadioAdapter: Send + Sync + Debug {
    /// Current power/authorization state
    async fn state(&self) -> AdapterState;

    /// Start reporting advertisements; an empty filter means every peripheral
    async fn scan_for_peripherals(&self, services: &[Uuid]) -> Result<(), AdapterError>;

    async fn stop_scan(&self) -> Result<(), AdapterError>;

    /// Peripherals already connected to this host that expose one of `services`
    async fn retrieve_connected_peripherals(
        &self,
        services: &[Uuid],
    ) -> Result<Vec<PeripheralInfo>, AdapterError>;

    /// Request a connection; confirmation arrives as [`AdapterEvent::Connected`]
    async fn connect(&self, id: &DeviceId) -> Result<(), AdapterError>;

    async fn disconnect(&self, id: &DeviceId) -> Result<(), AdapterError>;

    /// Route all further events to `sink`, replacing the previous one
    fn attach(&self, sink: EventSink);
}
