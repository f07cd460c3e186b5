//! Device registry
//!
//! Deduplicated, insertion-ordered list of discovered devices. Every change is
//! published as a complete replacement snapshot; observers never see a list
//! mid-edit.

use crate::domain::device::Device;
use crate::domain::models::{DeviceId, PeripheralInfo};
use std::sync::Arc;
use tokio::sync::watch;

/// Immutable view of the registry at one point in time
pub type DeviceSnapshot = Arc<[Device]>;

pub struct Registry {
    entries: Vec<Device>,
    snapshot: watch::Sender<DeviceSnapshot>,
}

impl Registry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(DeviceSnapshot::from(Vec::new()));
        Self {
            entries: Vec::new(),
            snapshot,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.entries.iter().any(|device| device.id() == id)
    }

    /// Admit a sighting. Returns the new entry, or `None` if the identity is
    /// already registered (the existing entry, name included, is untouched).
    pub fn admit(&mut self, info: PeripheralInfo) -> Option<Device> {
        if self.contains(&info.id) {
            return None;
        }

        let device = Device::new(info.id, info.name);
        self.entries.push(device.clone());
        self.publish();
        Some(device)
    }

    /// Entries matching an identity (at most one)
    pub fn matching<'a>(&'a self, id: &'a DeviceId) -> impl Iterator<Item = &'a Device> + 'a {
        self.entries.iter().filter(move |device| device.id() == id)
    }

    /// Drop every entry and publish the empty snapshot
    pub fn clear(&mut self) {
        self.entries.clear();
        self.publish();
    }

    fn publish(&self) {
        let snapshot: DeviceSnapshot = self.entries.clone().into();
        self.snapshot.send_replace(snapshot);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
