//! Device registry entry
//!
//! A `Device` is a cheap, clonable handle onto one discovered peripheral.
//! Identity and advertised name are fixed at creation; only the connection
//! state moves, and only through the lifecycle hooks below.

use crate::domain::models::{ConnectionState, DeviceId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;

const CONNECTION_EVENT_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    id: DeviceId,
    advertised_name: Option<String>,
    state: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
}

impl Device {
    /// Create a new entry; an empty name counts as no name
    pub(crate) fn new(id: DeviceId, advertised_name: Option<String>) -> Self {
        let advertised_name = advertised_name.filter(|name| !name.is_empty());
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(CONNECTION_EVENT_CAPACITY);
        Self {
            inner: Arc::new(DeviceInner {
                id,
                advertised_name,
                state,
                transitions,
            }),
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.inner.id
    }

    pub fn advertised_name(&self) -> Option<&str> {
        self.inner.advertised_name.as_deref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Follow the latest connection state
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// One item per lifecycle hook invocation, in delivery order
    pub fn connection_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.transitions.subscribe()
    }

    /// Mark that a connect request was issued against the adapter.
    ///
    /// Returns `false` (and changes nothing) unless the device is disconnected.
    pub fn begin_connect(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        })
    }

    /// Adapter confirmed the link
    pub fn on_connected(&self) {
        debug!("Device {} connected", self.inner.id);
        self.transition(ConnectionState::Connected);
    }

    /// Adapter or peer dropped the link
    pub fn on_disconnected(&self) {
        debug!("Device {} disconnected", self.inner.id);
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&self, next: ConnectionState) {
        self.inner.state.send_replace(next);
        // No subscribers is fine
        let _ = self.inner.transitions.send(next);
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.inner.id)
            .field("advertised_name", &self.inner.advertised_name)
            .field("connection_state", &self.connection_state())
            .finish()
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Device {}
