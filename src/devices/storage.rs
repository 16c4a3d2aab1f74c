// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Treated-water storage tank level sensor

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::core::{EventBus, Signal, SystemEventType};
use crate::error::Result;

use super::{Device, DeviceCore, DeviceStatus, SimFileSource, Telemetry, READING_EPSILON};

/// From here up the tank is close to capacity.
pub const WARNING_LEVEL: f64 = 950.0;
/// Above this the tank is overflowing.
pub const MAX_LEVEL: f64 = 1000.0;

/// Storage tank level sensor.
///
/// The level is deliberately not clamped: an overfull tank must be allowed
/// to report more litres than its nominal capacity so the Critical band is
/// reachable. Record layout: `timestamp,level,status`.
pub struct StorageSensor {
    core: DeviceCore,
    current: Mutex<f64>,
    reading_changed: Arc<Signal<f64>>,
}

impl StorageSensor {
    /// Open the simulation feed and construct the sensor at a mid level.
    pub fn new(name: &str, path: impl Into<PathBuf>, bus: Arc<EventBus>) -> Result<Self> {
        let source = SimFileSource::open(path)?;
        Ok(Self {
            core: DeviceCore::new(name, "StorageSensor", Some(source), bus),
            current: Mutex::new(500.0),
            reading_changed: Arc::new(Signal::new()),
        })
    }

    /// Current tank level in litres.
    pub fn current_reading(&self) -> f64 {
        *self.current.lock()
    }

    /// Reading-change signal.
    pub fn reading_changed(&self) -> &Arc<Signal<f64>> {
        &self.reading_changed
    }

    fn status_for(value: f64) -> DeviceStatus {
        if value > MAX_LEVEL {
            DeviceStatus::Critical
        } else if value >= WARNING_LEVEL {
            DeviceStatus::Warning
        } else {
            DeviceStatus::Online
        }
    }
}

#[async_trait]
impl Device for StorageSensor {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    async fn update(&self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        let Some(line) = self.core.next_record() else {
            return Ok(());
        };
        let fields: Vec<&str> = line.split(',').collect();
        let Some(value) = fields.get(1).and_then(|f| f.trim().parse::<f64>().ok()) else {
            return Ok(());
        };

        let previous = {
            let mut current = self.current.lock();
            std::mem::replace(&mut *current, value)
        };

        self.set_status(Self::status_for(value));
        self.core.touch();

        if (value - previous).abs() > READING_EPSILON {
            self.reading_changed.emit(&value);
            self.core.bus().publish(
                self.name(),
                SystemEventType::DataUpdate,
                format!("storage level changed: {value:.0} L"),
            );
        }

        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.core.base_telemetry();
        telemetry.insert("storageLevel".into(), json!(self.current_reading()));
        telemetry.insert("storageUnit".into(), json!("L"));
        telemetry
    }
}
