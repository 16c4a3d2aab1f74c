// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! AquaPlant - Simulated Water Treatment Plant Core
//!
//! Runs the full plant: seven devices replaying their CSV simulation feeds,
//! a scheduler polling them once per interval, and the system event bus
//! drained to the log until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use aquaplant::{
    ChemicalDoser, ChlorinePump, Config, DeviceRegistry, DeviceScheduler, EventBus, IntakePump,
    PhSensor, PressureSensor, StorageSensor, TempSensor, TurbiditySensor, VERSION,
};

/// AquaPlant - Simulated Water Treatment Plant Core
#[derive(Parser, Debug)]
#[command(name = "aquaplant")]
#[command(version = VERSION)]
#[command(about = "Simulated water-treatment plant device runtime")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation feed directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Polling interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("AquaPlant v{} - simulated water treatment plant core", VERSION);

    // Load or create configuration, then apply command line overrides
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.update_interval_ms = interval_ms;
    }

    info!("Configuration loaded from {:?}", config_path);
    info!("Simulation feeds in {:?}", config.data_dir);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

/// Build the plant from the configuration and run it until Ctrl+C.
async fn run(config: Config) -> Result<()> {
    use tokio::sync::broadcast;

    let bus = Arc::new(EventBus::new(config.event_capacity));
    let registry = Arc::new(DeviceRegistry::new());

    let ph = Arc::new(PhSensor::new(
        "pH Sensor",
        config.feed_path(&config.devices.ph_feed),
        Arc::clone(&bus),
    )?);
    registry.add(ph.clone())?;

    registry.add(Arc::new(PressureSensor::new(
        "Pressure Sensor",
        config.feed_path(&config.devices.pressure_feed),
        Arc::clone(&bus),
    )?))?;

    registry.add(Arc::new(TempSensor::new(
        "Temperature Sensor",
        config.feed_path(&config.devices.temperature_feed),
        Arc::clone(&bus),
    )?))?;

    registry.add(Arc::new(TurbiditySensor::with_threshold(
        "Filtration Sensor",
        config.feed_path(&config.devices.turbidity_feed),
        Arc::clone(&bus),
        config.devices.turbidity_alert_threshold,
    )?))?;

    registry.add(Arc::new(StorageSensor::new(
        "Storage Tank Sensor",
        config.feed_path(&config.devices.storage_feed),
        Arc::clone(&bus),
    )?))?;

    registry.add(Arc::new(IntakePump::new(
        "Main Intake Pump",
        config.feed_path(&config.devices.intake_pump_feed),
        Arc::clone(&bus),
    )?))?;

    registry.add(Arc::new(ChlorinePump::new(
        "Chlorine Pump",
        config.feed_path(&config.devices.chlorine_pump_feed),
        Arc::clone(&bus),
    )?))?;

    let doser = Arc::new(ChemicalDoser::new("Chemical Doser", Arc::clone(&bus)));
    doser.link_ph_sensor(&ph);
    registry.add(doser.clone())?;

    info!("{} devices registered", registry.len());

    // Drain the aggregate event stream; the bus already mirrors each event
    // into the log, so this consumer only keeps the channel from lagging.
    let mut events = bus.subscribe();
    tokio::spawn(async move { while events.recv().await.is_ok() {} });

    let scheduler = Arc::new(DeviceScheduler::new(
        Arc::clone(&registry),
        Arc::clone(&bus),
        config.update_interval(),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = Arc::clone(&scheduler);
    let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

    info!("AquaPlant running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
    handle.await?;

    info!("AquaPlant shutdown complete");
    Ok(())
}
