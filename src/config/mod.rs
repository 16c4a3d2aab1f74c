// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main plant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Plant name
    pub plant_name: String,

    /// Application version
    pub version: String,

    /// Directory holding the simulation feed files
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Polling interval in milliseconds
    pub update_interval_ms: u64,

    /// Event bus channel capacity
    pub event_capacity: usize,

    /// Device configuration
    pub devices: DeviceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plant_name: "Water Treatment Plant".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::from("./data/simulation"),
            log_level: "info".to_string(),
            update_interval_ms: 1000,
            event_capacity: 1024,
            devices: DeviceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("aquaplant"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// The polling interval as a [`Duration`].
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Resolve a feed file name against the data directory.
    pub fn feed_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}

/// Per-device configuration: simulation feed file names and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// pH sensor feed file
    pub ph_feed: String,

    /// Pressure sensor feed file
    pub pressure_feed: String,

    /// Temperature sensor feed file
    pub temperature_feed: String,

    /// Turbidity sensor feed file
    pub turbidity_feed: String,

    /// Storage tank sensor feed file
    pub storage_feed: String,

    /// Intake pump feed file
    pub intake_pump_feed: String,

    /// Chlorine pump feed file
    pub chlorine_pump_feed: String,

    /// Turbidity alert threshold in NTU
    pub turbidity_alert_threshold: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ph_feed: "pHSensor_simulation.csv".to_string(),
            pressure_feed: "PressureSensor_simulation.csv".to_string(),
            temperature_feed: "TempSensor_simulation.csv".to_string(),
            turbidity_feed: "FiltrationSensor_simulation.csv".to_string(),
            storage_feed: "StorageSensor_simulation.csv".to_string(),
            intake_pump_feed: "IntakePump_simulation.csv".to_string(),
            chlorine_pump_feed: "ChlorinePump_simulation.csv".to_string(),
            turbidity_alert_threshold: 5.0,
        }
    }
}
