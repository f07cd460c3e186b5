//! btleplug Radio Backend
//!
//! Binds the coordinator to the platform Bluetooth stack through btleplug.
//! A background task forwards central events to the attached sink.

use crate::domain::models::{AdapterEvent, AdapterState, DeviceId, PeripheralInfo};
use crate::infrastructure::bluetooth::adapter::{AdapterError, EventSink, RadioAdapter};
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

type SharedSink = Arc<Mutex<Option<EventSink>>>;
type KnownPeripherals = Arc<Mutex<HashMap<DeviceId, PeripheralId>>>;

impl From<btleplug::Error> for AdapterError {
    fn from(e: btleplug::Error) -> Self {
        AdapterError::Backend(e.to_string())
    }
}

fn map_state(state: CentralState) -> AdapterState {
    #[allow(unreachable_patterns)]
    match state {
        CentralState::PoweredOn => AdapterState::PoweredOn,
        CentralState::PoweredOff => AdapterState::PoweredOff,
        CentralState::Unknown => AdapterState::Unknown,
        _ => AdapterState::Unknown,
    }
}

pub struct BtleplugAdapter {
    adapter: Adapter,
    sink: SharedSink,
    known: KnownPeripherals,
    pump: JoinHandle<()>,
}

impl BtleplugAdapter {
    /// Open the first Bluetooth adapter on this host
    pub async fn new() -> Result<Self, AdapterError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(AdapterError::NoAdapter)?;

        match adapter.adapter_info().await {
            Ok(name) => info!("Using Bluetooth adapter: {}", name),
            Err(e) => debug!("Adapter info unavailable: {}", e),
        }

        let sink: SharedSink = Arc::new(Mutex::new(None));
        let known: KnownPeripherals = Arc::new(Mutex::new(HashMap::new()));
        let pump = tokio::spawn(pump_events(adapter.clone(), sink.clone(), known.clone()));

        Ok(Self {
            adapter,
            sink,
            known,
            pump,
        })
    }

    fn peripheral_id(&self, id: &DeviceId) -> Result<PeripheralId, AdapterError> {
        lock(&self.known)
            .get(id)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownPeripheral(id.clone()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

async fn pump_events(adapter: Adapter, sink: SharedSink, known: KnownPeripherals) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("Failed to subscribe to adapter events: {}", e);
            return;
        }
    };

    while let Some(event) = events.next().await {
        let translated = match event {
            CentralEvent::DeviceDiscovered(pid) | CentralEvent::DeviceUpdated(pid) => {
                let id = remember(&known, &pid);
                let name = local_name(&adapter, &pid).await;
                Some(AdapterEvent::Discovered(PeripheralInfo::new(id, name)))
            }
            CentralEvent::DeviceConnected(pid) => {
                Some(AdapterEvent::Connected(remember(&known, &pid)))
            }
            CentralEvent::DeviceDisconnected(pid) => {
                Some(AdapterEvent::Disconnected(remember(&known, &pid)))
            }
            CentralEvent::StateUpdate(state) => Some(AdapterEvent::StateChanged(map_state(state))),
            _ => None,
        };

        let Some(event) = translated else {
            continue;
        };
        let current = lock(&sink).clone();
        match current {
            Some(sink) => {
                if sink.send(event).is_err() {
                    debug!("Event sink closed; dropping adapter event");
                }
            }
            None => debug!("No sink attached; dropping {:?}", event),
        }
    }

    debug!("Adapter event stream ended");
}

fn remember(known: &KnownPeripherals, pid: &PeripheralId) -> DeviceId {
    let id = DeviceId::new(pid.to_string());
    lock(known).insert(id.clone(), pid.clone());
    id
}

async fn local_name(adapter: &Adapter, pid: &PeripheralId) -> Option<String> {
    let peripheral = adapter.peripheral(pid).await.ok()?;
    let properties = peripheral.properties().await.ok()??;
    properties.local_name
}

#[async_trait]
impl RadioAdapter for BtleplugAdapter {
    async fn state(&self) -> AdapterState {
        match self.adapter.adapter_state().await {
            Ok(state) => map_state(state),
            Err(e) => {
                warn!("Could not read adapter state: {}", e);
                AdapterState::Unknown
            }
        }
    }

    async fn scan_for_peripherals(&self, services: &[Uuid]) -> Result<(), AdapterError> {
        let filter = ScanFilter {
            services: services.to_vec(),
            ..Default::default()
        };
        self.adapter.start_scan(filter).await?;
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn retrieve_connected_peripherals(
        &self,
        services: &[Uuid],
    ) -> Result<Vec<PeripheralInfo>, AdapterError> {
        let mut connected = Vec::new();

        for peripheral in self.adapter.peripherals().await? {
            if !peripheral.is_connected().await.unwrap_or(false) {
                continue;
            }

            let properties = peripheral.properties().await?;
            let advertised = properties
                .as_ref()
                .map(|p| p.services.clone())
                .unwrap_or_default();
            if !services.is_empty() && !advertised.iter().any(|s| services.contains(s)) {
                continue;
            }

            let id = remember(&self.known, &peripheral.id());
            let name = properties.and_then(|p| p.local_name);
            connected.push(PeripheralInfo::new(id, name));
        }

        Ok(connected)
    }

    async fn connect(&self, id: &DeviceId) -> Result<(), AdapterError> {
        let pid = self.peripheral_id(id)?;
        let peripheral = self.adapter.peripheral(&pid).await?;
        peripheral.connect().await?;
        Ok(())
    }

    async fn disconnect(&self, id: &DeviceId) -> Result<(), AdapterError> {
        let pid = self.peripheral_id(id)?;
        let peripheral = self.adapter.peripheral(&pid).await?;
        peripheral.disconnect().await?;
        Ok(())
    }

    fn attach(&self, sink: EventSink) {
        *lock(&self.sink) = Some(sink);
    }
}

impl fmt::Debug for BtleplugAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BtleplugAdapter")
            .field("known_peripherals", &lock(&self.known).len())
            .finish()
    }
}

impl Drop for BtleplugAdapter {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
