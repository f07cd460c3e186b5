use senstick_coordinator::domain::settings::scan_duration_from_secs;
use senstick_coordinator::infrastructure::logging;
use senstick_coordinator::{AdapterState, BtleplugAdapter, Coordinator, SettingsService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// How long to wait for the radio to report power-on before scanning anyway
const POWER_ON_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting SenStick scanner");

    let mut config = settings.coordinator_config()?;
    if let Some(arg) = std::env::args().nth(1) {
        let secs: f64 = arg
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid scan duration '{}'", arg))?;
        config.default_scan_duration = scan_duration_from_secs(secs)?;
    }

    let adapter = BtleplugAdapter::new().await?;
    let coordinator = Coordinator::init(Arc::new(adapter), config)?;

    let mut state = coordinator.watch_adapter_state();
    let powered = tokio::time::timeout(
        POWER_ON_GRACE,
        state.wait_for(|s| *s == AdapterState::PoweredOn),
    )
    .await
    .map(|seen| seen.is_ok())
    .unwrap_or(false);
    if !powered {
        warn!(
            "Adapter not reported powered on (state: {}); trying anyway",
            coordinator.adapter_state()
        );
    }

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    coordinator.start_scan_default(move |remaining| {
        let _ = progress_tx.send(remaining);
    });

    while let Some(remaining) = progress_rx.recv().await {
        println!("Scanning... {}s remaining", remaining.as_secs_f64().ceil());
    }

    let devices = coordinator.devices();
    println!("Found {} device(s)", devices.len());
    for device in devices.iter() {
        println!(
            "  {}  {}",
            device.id(),
            device.advertised_name().unwrap_or("(unnamed)")
        );
    }

    Ok(())
}
