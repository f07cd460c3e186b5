//! In-memory radio adapter
//!
//! Scriptable stand-in for the platform stack: tests (and demos without
//! hardware) drive power state, advertisements and link events by hand, and
//! can inspect what the coordinator asked the adapter to do.

use crate::domain::models::{AdapterEvent, AdapterState, DeviceId, PeripheralInfo};
use crate::infrastructure::bluetooth::adapter::{AdapterError, EventSink, RadioAdapter};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MockState {
    state: AdapterState,
    scanning: bool,
    scan_starts: usize,
    scan_stops: usize,
    fail_next_scan: bool,
    last_filter: Vec<Uuid>,
    connected: Vec<PeripheralInfo>,
    connect_requests: Vec<DeviceId>,
    sink: Option<EventSink>,
}

#[derive(Debug, Default)]
pub struct MockAdapter {
    inner: Mutex<MockState>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter that starts out powered on
    pub fn powered_on() -> Self {
        let adapter = Self::default();
        adapter.lock().state = AdapterState::PoweredOn;
        adapter
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not poison every later assertion
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver a raw event to whoever is attached. Returns `false` if nobody is.
    pub fn emit(&self, event: AdapterEvent) -> bool {
        let sink = self.lock().sink.clone();
        trace!("Mock adapter emitting {:?}", event);
        match sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    /// Change power state and notify
    pub fn set_state(&self, state: AdapterState) {
        {
            let mut inner = self.lock();
            inner.state = state;
            if state != AdapterState::PoweredOn {
                inner.scanning = false;
            }
        }
        self.emit(AdapterEvent::StateChanged(state));
    }

    /// Register a peripheral that is already connected to the host
    pub fn add_connected(&self, info: PeripheralInfo) {
        self.lock().connected.push(info);
    }

    /// Simulate an advertisement sighting
    pub fn advertise(&self, id: &str, name: Option<&str>) -> bool {
        self.emit(AdapterEvent::Discovered(PeripheralInfo::new(
            id,
            name.map(str::to_string),
        )))
    }

    pub fn connect_notify(&self, id: &str) -> bool {
        self.emit(AdapterEvent::Connected(DeviceId::from(id)))
    }

    pub fn disconnect_notify(&self, id: &str) -> bool {
        self.emit(AdapterEvent::Disconnected(DeviceId::from(id)))
    }

    /// Make the next `scan_for_peripherals` call fail
    pub fn fail_next_scan(&self) {
        self.lock().fail_next_scan = true;
    }

    pub fn is_scanning(&self) -> bool {
        self.lock().scanning
    }

    pub fn scan_starts(&self) -> usize {
        self.lock().scan_starts
    }

    pub fn scan_stops(&self) -> usize {
        self.lock().scan_stops
    }

    pub fn last_filter(&self) -> Vec<Uuid> {
        self.lock().last_filter.clone()
    }

    pub fn connect_requests(&self) -> Vec<DeviceId> {
        self.lock().connect_requests.clone()
    }

    /// Whether `sink` is the one currently receiving events
    pub fn is_attached_to(&self, sink: &EventSink) -> bool {
        self.lock()
            .sink
            .as_ref()
            .is_some_and(|current| current.same_channel(sink))
    }
}

#[async_trait]
impl RadioAdapter for MockAdapter {
    async fn state(&self) -> AdapterState {
        self.lock().state
    }

    async fn scan_for_peripherals(&self, services: &[Uuid]) -> Result<(), AdapterError> {
        let mut inner = self.lock();
        if inner.state != AdapterState::PoweredOn {
            return Err(AdapterError::Unavailable(inner.state));
        }
        if inner.fail_next_scan {
            inner.fail_next_scan = false;
            return Err(AdapterError::Backend("scripted scan failure".to_string()));
        }
        inner.scanning = true;
        inner.scan_starts += 1;
        inner.last_filter = services.to_vec();
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        let mut inner = self.lock();
        inner.scanning = false;
        inner.scan_stops += 1;
        Ok(())
    }

    async fn retrieve_connected_peripherals(
        &self,
        _services: &[Uuid],
    ) -> Result<Vec<PeripheralInfo>, AdapterError> {
        Ok(self.lock().connected.clone())
    }

    async fn connect(&self, id: &DeviceId) -> Result<(), AdapterError> {
        let mut inner = self.lock();
        if inner.state != AdapterState::PoweredOn {
            return Err(AdapterError::Unavailable(inner.state));
        }
        inner.connect_requests.push(id.clone());
        Ok(())
    }

    async fn disconnect(&self, id: &DeviceId) -> Result<(), AdapterError> {
        let inner = self.lock();
        if !inner.connected.iter().any(|p| &p.id == id)
            && !inner.connect_requests.contains(id)
        {
            return Err(AdapterError::UnknownPeripheral(id.clone()));
        }
        Ok(())
    }

    fn attach(&self, sink: EventSink) {
        self.lock().sink = Some(sink);
    }
}
