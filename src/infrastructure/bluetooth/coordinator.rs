//! Device Discovery & Connection Coordinator
//!
//! One coordinator owns the radio adapter for the whole process. All adapter
//! events, scan timer ticks and application commands are handled by a single
//! actor task, so registry mutation, countdown and connection fan-out never
//! interleave. Callers talk to it through the cheap, clonable [`Coordinator`]
//! handle and read state from published snapshots.
//!
//! ```text
//!  application ──commands──┐
//!                          ▼
//!  adapter ──events──▶ CoordinatorActor ──snapshots/events──▶ observers
//!                          ▲
//!  scan timer ──ticks──────┘
//! ```

use crate::domain::device::Device;
use crate::domain::models::{
    AdapterEvent, AdapterState, CoordinatorEvent, DeviceId, PeripheralInfo, ScanRejection,
};
use crate::domain::registry::{DeviceSnapshot, Registry};
use crate::infrastructure::bluetooth::adapter::{EventSink, RadioAdapter};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::scan::{ProgressCallback, ScanSession, Tick};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

static SHARED: OnceLock<Coordinator> = OnceLock::new();

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("coordinator already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Services a peripheral must advertise to be reported (empty = all)
    pub service_filter: Vec<Uuid>,
    /// Duration used by [`Coordinator::start_scan_default`]
    pub default_scan_duration: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            service_filter: vec![protocol::advertising_service_uuid()],
            default_scan_duration: Duration::from_secs(5),
        }
    }
}

enum Command {
    StartScan {
        duration: Duration,
        on_progress: Option<ProgressCallback>,
    },
    CancelScan,
    Reset,
}

/// Handle to the coordinator actor
#[derive(Clone)]
pub struct Coordinator {
    commands: mpsc::UnboundedSender<Command>,
    adapter: Arc<dyn RadioAdapter>,
    config: Arc<CoordinatorConfig>,
    devices: watch::Receiver<DeviceSnapshot>,
    adapter_state: watch::Receiver<AdapterState>,
    scanning: watch::Receiver<bool>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl Coordinator {
    /// Take ownership of `adapter` and start the coordinator task.
    ///
    /// Must be called from within a tokio runtime. The adapter's event sink is
    /// replaced with the coordinator's.
    pub fn spawn(adapter: Arc<dyn RadioAdapter>, config: CoordinatorConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (sink, adapter_events) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(AdapterState::Unknown);
        let (scanning_tx, scanning_rx) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let registry = Registry::new();
        let devices = registry.subscribe();
        let config = Arc::new(config);

        adapter.attach(sink.clone());

        let actor = CoordinatorActor {
            adapter: adapter.clone(),
            config: config.clone(),
            commands: command_rx,
            adapter_events,
            sink,
            registry,
            session: None,
            adapter_state: state_tx,
            scanning: scanning_tx,
            events: events.clone(),
        };
        tokio::spawn(actor.run());

        Self {
            commands: command_tx,
            adapter,
            config,
            devices,
            adapter_state: state_rx,
            scanning: scanning_rx,
            events,
        }
    }

    /// Create the process-wide coordinator. Fails if one already exists.
    pub fn init(
        adapter: Arc<dyn RadioAdapter>,
        config: CoordinatorConfig,
    ) -> Result<&'static Coordinator, CoordinatorError> {
        let mut created = false;
        let shared = SHARED.get_or_init(|| {
            created = true;
            Self::spawn(adapter, config)
        });

        if created {
            info!("Device coordinator initialized");
            Ok(shared)
        } else {
            Err(CoordinatorError::AlreadyInitialized)
        }
    }

    /// The process-wide coordinator.
    ///
    /// # Panics
    /// If [`Coordinator::init`] has not completed. Using the coordinator before
    /// the adapter exists is a programming error.
    pub fn shared() -> &'static Coordinator {
        shared_from(&SHARED)
    }

    pub fn try_shared() -> Option<&'static Coordinator> {
        SHARED.get()
    }

    /// Start a scan of `duration` (clamped to 1..=30 s).
    ///
    /// Returns immediately. `on_progress` receives the remaining time once per
    /// second and finally `Duration::ZERO`, exactly once. A rejected request
    /// gets the zero straight away. The device list is cleared either way.
    pub fn start_scan<F>(&self, duration: Duration, on_progress: F)
    where
        F: FnMut(Duration) + Send + 'static,
    {
        self.send_start(duration, Some(Box::new(on_progress)));
    }

    /// Scan for the configured default duration
    pub fn start_scan_default<F>(&self, on_progress: F)
    where
        F: FnMut(Duration) + Send + 'static,
    {
        self.start_scan(self.config.default_scan_duration, on_progress);
    }

    /// Scan without progress reporting
    pub fn start_scan_silent(&self, duration: Duration) {
        self.send_start(duration, None);
    }

    fn send_start(&self, duration: Duration, on_progress: Option<ProgressCallback>) {
        let command = Command::StartScan {
            duration,
            on_progress,
        };
        if let Err(mpsc::error::SendError(command)) = self.commands.send(command) {
            warn!("Coordinator is not running; scan request dropped");
            if let Command::StartScan {
                on_progress: Some(mut callback),
                ..
            } = command
            {
                callback(Duration::ZERO);
            }
        }
    }

    /// Stop the active scan, if any. Safe to call repeatedly.
    pub fn cancel_scan(&self) {
        self.send(Command::CancelScan);
    }

    /// Clear the device list and take the adapter's event sink back
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Coordinator is not running; command dropped");
        }
    }

    /// The adapter handle, for collaborators that need raw access (connect
    /// requests, firmware update). Call [`Coordinator::reset`] once done if
    /// the sink was re-attached elsewhere.
    pub fn adapter(&self) -> Arc<dyn RadioAdapter> {
        self.adapter.clone()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Current device snapshot
    pub fn devices(&self) -> DeviceSnapshot {
        self.devices.borrow().clone()
    }

    pub fn watch_devices(&self) -> watch::Receiver<DeviceSnapshot> {
        self.devices.clone()
    }

    pub fn adapter_state(&self) -> AdapterState {
        *self.adapter_state.borrow()
    }

    pub fn watch_adapter_state(&self) -> watch::Receiver<AdapterState> {
        self.adapter_state.clone()
    }

    pub fn is_scanning(&self) -> bool {
        *self.scanning.borrow()
    }

    pub fn watch_scanning(&self) -> watch::Receiver<bool> {
        self.scanning.clone()
    }

    /// Status feed; slow subscribers may observe `Lagged`
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }
}

enum Step {
    Command(Command),
    Adapter(AdapterEvent),
    Tick,
    Shutdown,
}

struct CoordinatorActor {
    adapter: Arc<dyn RadioAdapter>,
    config: Arc<CoordinatorConfig>,
    commands: mpsc::UnboundedReceiver<Command>,
    adapter_events: mpsc::UnboundedReceiver<AdapterEvent>,
    sink: EventSink,
    registry: Registry,
    session: Option<ScanSession>,
    adapter_state: watch::Sender<AdapterState>,
    scanning: watch::Sender<bool>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl CoordinatorActor {
    async fn run(mut self) {
        let initial = self.adapter.state().await;
        self.publish_state(initial);

        loop {
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Shutdown,
                },
                Some(event) = self.adapter_events.recv() => Step::Adapter(event),
                _ = next_tick(&mut self.session) => Step::Tick,
            };

            match step {
                Step::Command(command) => self.handle_command(command).await,
                Step::Adapter(event) => self.handle_adapter_event(event).await,
                Step::Tick => self.handle_tick().await,
                Step::Shutdown => break,
            }
        }

        self.cancel_scan().await;
        debug!("Coordinator task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartScan {
                duration,
                on_progress,
            } => self.start_scan(duration, on_progress).await,
            Command::CancelScan => self.cancel_scan().await,
            Command::Reset => self.reset(),
        }
    }

    async fn handle_adapter_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::StateChanged(state) => self.handle_state_change(state).await,
            AdapterEvent::Discovered(info) => self.add_peripheral(info),
            AdapterEvent::Connected(id) => self.dispatch_link(&id, Device::on_connected),
            AdapterEvent::Disconnected(id) => self.dispatch_link(&id, Device::on_disconnected),
        }
    }

    async fn start_scan(&mut self, duration: Duration, on_progress: Option<ProgressCallback>) {
        // Cleared before the checks, so a rejected request still empties the list
        self.clear_registry();

        if self.session.is_some() {
            self.reject(ScanRejection::AlreadyScanning, on_progress);
            return;
        }

        let state = self.adapter.state().await;
        if state != AdapterState::PoweredOn {
            self.reject(ScanRejection::AdapterUnavailable(state), on_progress);
            return;
        }

        let filter = self.config.service_filter.clone();
        match self.adapter.retrieve_connected_peripherals(&filter).await {
            Ok(connected) => {
                for info in connected {
                    self.add_peripheral(info);
                }
            }
            Err(e) => warn!("Could not enumerate connected peripherals: {}", e),
        }

        if let Err(e) = self.adapter.scan_for_peripherals(&filter).await {
            error!("Failed to start scan: {}", e);
            self.reject(ScanRejection::AdapterFailed(e.to_string()), on_progress);
            return;
        }

        let session = ScanSession::start(duration, on_progress);
        let duration = session.duration();
        self.session = Some(session);
        self.scanning.send_replace(true);

        info!("Scan started for {:?}", duration);
        self.emit(CoordinatorEvent::ScanStarted { duration });
    }

    fn reject(&self, reason: ScanRejection, on_progress: Option<ProgressCallback>) {
        warn!("Scan rejected: {}", reason);
        if let Some(mut callback) = on_progress {
            callback(Duration::ZERO);
        }
        self.emit(CoordinatorEvent::ScanRejected(reason));
    }

    async fn cancel_scan(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("No active scan to cancel");
            return;
        };

        session.finish();

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Adapter failed to stop scanning: {}", e);
        }
        self.scanning.send_replace(false);

        info!("Scan stopped");
        self.emit(CoordinatorEvent::ScanFinished);
    }

    async fn handle_tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.advance() {
            Tick::Progress(remaining) => {
                debug!("Scan remaining: {:?}", remaining);
                self.emit(CoordinatorEvent::ScanProgress { remaining });
            }
            Tick::Expired => self.cancel_scan().await,
        }
    }

    fn reset(&mut self) {
        self.clear_registry();
        self.adapter.attach(self.sink.clone());
        info!("Coordinator reset; adapter events reclaimed");
        self.emit(CoordinatorEvent::Reset);
    }

    async fn handle_state_change(&mut self, state: AdapterState) {
        self.publish_state(state);

        if state.invalidates_devices() {
            if self.session.is_some() {
                warn!("Adapter became {} during scan; cancelling", state);
                self.cancel_scan().await;
            }
            self.clear_registry();
        }
    }

    fn publish_state(&self, state: AdapterState) {
        let previous = self.adapter_state.send_replace(state);
        if previous != state {
            info!("Adapter state: {} -> {}", previous, state);
        }
        self.emit(CoordinatorEvent::AdapterStateChanged(state));
    }

    fn add_peripheral(&mut self, info: PeripheralInfo) {
        if let Some(device) = self.registry.admit(info) {
            info!(
                "Discovered device {} ({})",
                device.id(),
                device.advertised_name().unwrap_or("unnamed")
            );
            self.emit(CoordinatorEvent::DeviceAdded(device));
        }
    }

    fn dispatch_link(&self, id: &DeviceId, hook: fn(&Device)) {
        let mut delivered = false;
        for device in self.registry.matching(id) {
            hook(device);
            delivered = true;
        }

        if !delivered {
            debug!("Dropping link notification for untracked device {}", id);
            self.emit(CoordinatorEvent::StaleNotification(id.clone()));
        }
    }

    fn clear_registry(&mut self) {
        if !self.registry.is_empty() {
            debug!("Clearing {} device(s)", self.registry.len());
        }
        self.registry.clear();
        self.emit(CoordinatorEvent::RegistryCleared);
    }

    fn emit(&self, event: CoordinatorEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

fn shared_from(cell: &OnceLock<Coordinator>) -> &Coordinator {
    match cell.get() {
        Some(coordinator) => coordinator,
        None => panic!("Coordinator::shared() called before Coordinator::init()"),
    }
}

async fn next_tick(session: &mut Option<ScanSession>) {
    match session {
        Some(session) => session.wait_tick().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ConnectionState;
    use crate::infrastructure::bluetooth::mock::MockAdapter;
    use tokio::time::{sleep, Instant};

    fn setup(adapter: MockAdapter) -> (Coordinator, Arc<MockAdapter>) {
        let adapter = Arc::new(adapter);
        let coordinator = Coordinator::spawn(adapter.clone(), CoordinatorConfig::default());
        (coordinator, adapter)
    }

    fn progress() -> (
        impl FnMut(Duration) + Send + 'static,
        mpsc::UnboundedReceiver<Duration>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = move |remaining: Duration| {
            let _ = tx.send(remaining);
        };
        (callback, rx)
    }

    /// Let the coordinator drain its queues without crossing a tick boundary
    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    async fn collect(rx: &mut mpsc::UnboundedReceiver<Duration>) -> Vec<Duration> {
        let mut seen = Vec::new();
        while let Some(remaining) = rx.recv().await {
            seen.push(remaining);
        }
        seen
    }

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    fn ids(coordinator: &Coordinator) -> Vec<String> {
        coordinator
            .devices()
            .iter()
            .map(|d| d.id().to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_is_published() {
        let (coordinator, _adapter) = setup(MockAdapter::powered_on());
        settle().await;
        assert_eq!(coordinator.adapter_state(), AdapterState::PoweredOn);
        assert!(!coordinator.is_scanning());
        assert!(coordinator.devices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_counts_down_to_zero_once() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        let (callback, mut rx) = progress();
        let started = Instant::now();

        coordinator.start_scan(Duration::from_secs(4), callback);
        settle().await;
        assert!(coordinator.is_scanning());
        assert!(adapter.is_scanning());

        assert_eq!(collect(&mut rx).await, secs(&[3, 2, 1, 0]));
        assert_eq!(started.elapsed(), Duration::from_secs(4));

        settle().await;
        assert!(!coordinator.is_scanning());
        assert!(!adapter.is_scanning());
        assert_eq!(adapter.scan_starts(), 1);
        assert_eq!(adapter.scan_stops(), 1);
        assert_eq!(
            adapter.last_filter(),
            vec![protocol::advertising_service_uuid()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_scan_is_clamped_up() {
        let (coordinator, _adapter) = setup(MockAdapter::powered_on());
        let (callback, mut rx) = progress();
        let started = Instant::now();

        coordinator.start_scan(Duration::from_millis(100), callback);
        assert_eq!(collect(&mut rx).await, secs(&[0]));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_scan_is_clamped_down() {
        let (coordinator, _adapter) = setup(MockAdapter::powered_on());
        let (callback, mut rx) = progress();
        let started = Instant::now();

        coordinator.start_scan(Duration::from_secs(90), callback);
        let seen = collect(&mut rx).await;

        assert_eq!(seen.len(), 30);
        assert_eq!(seen.first(), Some(&Duration::from_secs(29)));
        assert_eq!(seen.iter().filter(|r| r.is_zero()).count(), 1);
        assert!(seen.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_twice_fires_terminal_once() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        let (callback, mut rx) = progress();

        coordinator.start_scan(Duration::from_secs(10), callback);
        assert_eq!(rx.recv().await, Some(Duration::from_secs(9)));

        coordinator.cancel_scan();
        coordinator.cancel_scan();

        assert_eq!(collect(&mut rx).await, secs(&[0]));
        settle().await;
        assert!(!coordinator.is_scanning());
        assert_eq!(adapter.scan_stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_scan_is_noop() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        coordinator.cancel_scan();
        settle().await;
        assert_eq!(adapter.scan_stops(), 0);
        assert!(!coordinator.is_scanning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_scan_is_rejected() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        let (first, mut first_rx) = progress();
        let (second, mut second_rx) = progress();
        let mut events = coordinator.subscribe();

        coordinator.start_scan(Duration::from_secs(3), first);
        settle().await;
        coordinator.start_scan(Duration::from_secs(20), second);

        assert_eq!(collect(&mut second_rx).await, secs(&[0]));
        assert_eq!(collect(&mut first_rx).await, secs(&[2, 1, 0]));
        assert_eq!(adapter.scan_starts(), 1);

        let mut rejected = false;
        while let Ok(event) = events.try_recv() {
            if let CoordinatorEvent::ScanRejected(reason) = event {
                assert_eq!(reason, ScanRejection::AlreadyScanning);
                rejected = true;
            }
        }
        assert!(rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_scan_still_clears_devices() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        coordinator.start_scan_silent(Duration::from_secs(10));
        settle().await;
        adapter.advertise("a", Some("SenStick"));
        settle().await;
        assert_eq!(ids(&coordinator), vec!["a"]);

        let (callback, mut rx) = progress();
        coordinator.start_scan(Duration::from_secs(5), callback);
        assert_eq!(collect(&mut rx).await, secs(&[0]));
        assert!(coordinator.devices().is_empty());
        assert!(coordinator.is_scanning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_requires_powered_on() {
        let (coordinator, adapter) = setup(MockAdapter::new());
        adapter.set_state(AdapterState::PoweredOff);
        let (callback, mut rx) = progress();

        coordinator.start_scan(Duration::from_secs(5), callback);
        assert_eq!(collect(&mut rx).await, secs(&[0]));
        settle().await;
        assert!(!coordinator.is_scanning());
        assert_eq!(adapter.scan_starts(), 0);
        assert_eq!(coordinator.adapter_state(), AdapterState::PoweredOff);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_scan_failure_reports_zero() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        adapter.fail_next_scan();
        let (callback, mut rx) = progress();

        coordinator.start_scan(Duration::from_secs(5), callback);
        assert_eq!(collect(&mut rx).await, secs(&[0]));
        settle().await;
        assert!(!coordinator.is_scanning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_peripherals_seed_the_list() {
        let adapter = MockAdapter::powered_on();
        adapter.add_connected(PeripheralInfo::new("c", Some("SenStick".to_string())));
        let (coordinator, adapter) = setup(adapter);

        coordinator.start_scan_silent(Duration::from_secs(5));
        settle().await;
        adapter.advertise("a", None);
        adapter.advertise("c", None);
        settle().await;

        assert_eq!(ids(&coordinator), vec!["c", "a"]);
        assert_eq!(coordinator.devices()[0].advertised_name(), Some("SenStick"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_sightings_dedup_and_keep_name() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        adapter.advertise("a", Some("SenStick"));
        for _ in 0..5 {
            adapter.advertise("a", Some(""));
            adapter.advertise("a", None);
        }
        adapter.advertise("b", None);
        settle().await;

        let devices = coordinator.devices();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].advertised_name(), Some("SenStick"));
        assert_eq!(devices[1].advertised_name(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_loss_clears_devices_and_scan() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        let (callback, mut rx) = progress();
        coordinator.start_scan(Duration::from_secs(10), callback);
        settle().await;
        adapter.advertise("a", None);
        adapter.advertise("b", None);
        settle().await;
        assert_eq!(coordinator.devices().len(), 2);

        adapter.set_state(AdapterState::PoweredOff);
        assert_eq!(collect(&mut rx).await, secs(&[0]));
        settle().await;

        assert!(coordinator.devices().is_empty());
        assert!(!coordinator.is_scanning());
        assert_eq!(coordinator.adapter_state(), AdapterState::PoweredOff);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resetting_and_power_on_keep_devices() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        adapter.advertise("a", None);
        adapter.set_state(AdapterState::Resetting);
        adapter.set_state(AdapterState::PoweredOn);
        settle().await;
        assert_eq!(ids(&coordinator), vec!["a"]);

        adapter.set_state(AdapterState::Unauthorized);
        settle().await;
        assert!(coordinator.devices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_events_reach_device_in_order() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        adapter.advertise("a", None);
        settle().await;
        let device = coordinator.devices()[0].clone();
        let mut link = device.connection_events();

        assert!(device.begin_connect());
        adapter.connect_notify("a");
        adapter.disconnect_notify("a");
        adapter.connect_notify("a");
        settle().await;

        assert_eq!(link.try_recv().unwrap(), ConnectionState::Connected);
        assert_eq!(link.try_recv().unwrap(), ConnectionState::Disconnected);
        assert_eq!(link.try_recv().unwrap(), ConnectionState::Connected);
        assert!(link.try_recv().is_err());
        assert_eq!(device.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_disconnect_is_dropped() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        settle().await;
        let mut events = coordinator.subscribe();

        adapter.disconnect_notify("ghost");
        settle().await;

        assert!(coordinator.devices().is_empty());
        let mut stale = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let CoordinatorEvent::StaleNotification(id) = event {
                stale.push(id);
            }
        }
        assert_eq!(stale, vec![DeviceId::from("ghost")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_reclaims_adapter_events() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        adapter.advertise("a", None);
        settle().await;

        // Firmware update borrows the adapter
        let (borrowed_tx, mut borrowed_rx) = mpsc::unbounded_channel();
        coordinator.adapter().attach(borrowed_tx.clone());
        adapter.advertise("b", None);
        settle().await;
        assert!(borrowed_rx.try_recv().is_ok());
        assert_eq!(ids(&coordinator), vec!["a"]);

        coordinator.reset();
        settle().await;
        assert!(coordinator.devices().is_empty());
        assert!(!adapter.is_attached_to(&borrowed_tx));

        adapter.advertise("c", None);
        settle().await;
        assert_eq!(ids(&coordinator), vec!["c"]);
        assert!(borrowed_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshots_are_whole() {
        let (coordinator, adapter) = setup(MockAdapter::powered_on());
        let mut watch = coordinator.watch_devices();
        adapter.advertise("a", None);
        watch.changed().await.unwrap();
        let first = watch.borrow_and_update().clone();

        adapter.advertise("b", None);
        watch.changed().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(watch.borrow().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_duration_from_config() {
        let adapter = Arc::new(MockAdapter::powered_on());
        let config = CoordinatorConfig {
            service_filter: Vec::new(),
            default_scan_duration: Duration::from_secs(2),
        };
        let coordinator = Coordinator::spawn(adapter.clone(), config);
        let (callback, mut rx) = progress();

        coordinator.start_scan_default(callback);
        assert_eq!(collect(&mut rx).await, secs(&[1, 0]));
        assert!(adapter.last_filter().is_empty());
    }

    #[test]
    #[should_panic(expected = "before Coordinator::init")]
    fn test_shared_before_init_panics() {
        let cell = OnceLock::new();
        shared_from(&cell);
    }

    #[tokio::test]
    async fn test_process_wide_accessor() {
        let first = Coordinator::init(
            Arc::new(MockAdapter::powered_on()),
            CoordinatorConfig::default(),
        )
        .unwrap();
        let second = Coordinator::init(Arc::new(MockAdapter::new()), CoordinatorConfig::default());

        assert!(matches!(second, Err(CoordinatorError::AlreadyInitialized)));
        assert!(std::ptr::eq(first, Coordinator::shared()));
        assert!(Coordinator::try_shared().is_some());
    }
}
