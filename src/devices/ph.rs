// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! pH sensor - drives the chemical doser through its reading-change signal

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::core::{EventBus, Signal, SystemEventType};
use crate::error::Result;

use super::{Device, DeviceCore, DeviceStatus, SimFileSource, Telemetry, READING_EPSILON};

/// Lowest measurable pH; readings are clamped up to this.
pub const MIN_PH: f64 = 5.0;
/// Highest measurable pH; readings are clamped down to this.
pub const MAX_PH: f64 = 9.0;
/// Lower edge of the safe band; below it the doser engages.
pub const LOWER_SAFE_PH: f64 = 6.5;
/// Upper edge of the safe band; above it the doser engages.
pub const UPPER_SAFE_PH: f64 = 8.5;

/// pH sensor fed by a simulation file.
///
/// Record layout: `timestamp,phValue,status`. One record is consumed per
/// tick; the reading is clamped to [5.0, 9.0] and a change event fires only
/// when the reading moves by more than 0.01 pH.
pub struct PhSensor {
    core: DeviceCore,
    current: Mutex<f64>,
    reading_changed: Arc<Signal<f64>>,
}

impl PhSensor {
    /// Open the simulation feed and construct the sensor at neutral pH.
    pub fn new(name: &str, path: impl Into<PathBuf>, bus: Arc<EventBus>) -> Result<Self> {
        let source = SimFileSource::open(path)?;
        Ok(Self {
            core: DeviceCore::new(name, "PhSensor", Some(source), bus),
            current: Mutex::new(7.0),
            reading_changed: Arc::new(Signal::new()),
        })
    }

    /// Current pH reading.
    pub fn current_reading(&self) -> f64 {
        *self.current.lock()
    }

    /// Reading-change signal; the chemical doser subscribes here.
    pub fn reading_changed(&self) -> &Arc<Signal<f64>> {
        &self.reading_changed
    }

    fn status_for(value: f64) -> DeviceStatus {
        if !(LOWER_SAFE_PH..=UPPER_SAFE_PH).contains(&value) {
            DeviceStatus::Warning
        } else if !(6.0..=9.0).contains(&value) {
            // Evaluated after the warning band, and the reading is already
            // clamped to [5.0, 9.0], so this branch cannot win; the ordering
            // is part of the alerting contract and must not be reshuffled.
            DeviceStatus::Critical
        } else {
            DeviceStatus::Online
        }
    }
}

#[async_trait]
impl Device for PhSensor {
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
            // Malformed reading: skip this tick, not an error.
            return Ok(());
        };

        let value = value.clamp(MIN_PH, MAX_PH);
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
                format!("pH reading changed: {value:.2}"),
            );
            if !(LOWER_SAFE_PH..=UPPER_SAFE_PH).contains(&value) {
                self.core.bus().publish(
                    self.name(),
                    SystemEventType::Warning,
                    format!(
                        "pH out of range: {value:.2} (safe range: {LOWER_SAFE_PH}-{UPPER_SAFE_PH})"
                    ),
                );
            }
        }

        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.core.base_telemetry();
        telemetry.insert("phReading".into(), json!(self.current_reading()));
        telemetry
    }
}
