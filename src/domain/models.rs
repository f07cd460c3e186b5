use crate::domain::device::Device;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Power/authorization state of the radio adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdapterState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    /// Integer encoding used by the platform radio stack
    pub fn raw(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Resetting => 1,
            Self::Unsupported => 2,
            Self::Unauthorized => 3,
            Self::PoweredOff => 4,
            Self::PoweredOn => 5,
        }
    }

    /// Decode the platform integer; anything out of range is `Unknown`
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => Self::Resetting,
            2 => Self::Unsupported,
            3 => Self::Unauthorized,
            4 => Self::PoweredOff,
            5 => Self::PoweredOn,
            _ => Self::Unknown,
        }
    }

    /// States in which no discovered device can be trusted
    pub fn invalidates_devices(self) -> bool {
        matches!(
            self,
            Self::PoweredOff | Self::Unauthorized | Self::Unknown | Self::Unsupported
        )
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Resetting => "resetting",
            Self::Unsupported => "unsupported",
            Self::Unauthorized => "unauthorized",
            Self::PoweredOff => "powered off",
            Self::PoweredOn => "powered on",
        };
        f.write_str(name)
    }
}

/// Stable identifier of a peripheral as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// A peripheral sighting: identity plus whatever name it advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralInfo {
    pub id: DeviceId,
    pub name: Option<String>,
}

impl PeripheralInfo {
    pub fn new(id: impl Into<DeviceId>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }
}

/// Events delivered by the radio adapter to its attached sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    StateChanged(AdapterState),
    Discovered(PeripheralInfo),
    Connected(DeviceId),
    Disconnected(DeviceId),
}

/// Why a scan request was answered with an immediate zero.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanRejection {
    #[error("adapter is not powered on (state: {0})")]
    AdapterUnavailable(AdapterState),

    #[error("a scan is already in progress")]
    AlreadyScanning,

    #[error("adapter failed to start scanning: {0}")]
    AdapterFailed(String),
}

/// Status feed published by the coordinator.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    AdapterStateChanged(AdapterState),
    DeviceAdded(Device),
    RegistryCleared,
    ScanStarted { duration: Duration },
    ScanProgress { remaining: Duration },
    ScanFinished,
    ScanRejected(ScanRejection),
    StaleNotification(DeviceId),
    Reset,
}
