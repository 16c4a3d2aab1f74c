// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Pipeline pressure sensor

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::core::{EventBus, Signal, SystemEventType};
use crate::error::Result;

use super::{Device, DeviceCore, DeviceStatus, SimFileSource, Telemetry, READING_EPSILON};

/// Below this the line has probably lost a pump or sprung a leak.
pub const MIN_SAFE_PRESSURE: f64 = 1.5;
/// Normal operating range, lower edge.
pub const NORMAL_PRESSURE_LOW: f64 = 2.0;
/// Normal operating range, upper edge.
pub const NORMAL_PRESSURE_HIGH: f64 = 2.6;
/// At or above this the line is critically over pressure.
pub const CRITICAL_PRESSURE: f64 = 3.0;
/// Absolute sensor maximum in bar.
pub const MAX_PRESSURE: f64 = 5.0;

/// Pressure sensor monitoring pipeline and filter pressure.
///
/// Record layout: `timestamp,pressure,location,status`; readings are clamped
/// to [0, 5.0] bar.
pub struct PressureSensor {
    core: DeviceCore,
    current: Mutex<f64>,
    reading_changed: Arc<Signal<f64>>,
}

impl PressureSensor {
    /// Open the simulation feed and construct the sensor at normal pressure.
    pub fn new(name: &str, path: impl Into<PathBuf>, bus: Arc<EventBus>) -> Result<Self> {
        let source = SimFileSource::open(path)?;
        Ok(Self {
            core: DeviceCore::new(name, "PressureSensor", Some(source), bus),
            current: Mutex::new(2.3),
            reading_changed: Arc::new(Signal::new()),
        })
    }

    /// Current pressure in bar.
    pub fn current_reading(&self) -> f64 {
        *self.current.lock()
    }

    /// Reading-change signal.
    pub fn reading_changed(&self) -> &Arc<Signal<f64>> {
        &self.reading_changed
    }

    /// Operator-facing description of the current pressure band.
    pub fn pressure_status_description(&self) -> &'static str {
        let value = self.current_reading();
        if value < MIN_SAFE_PRESSURE {
            "CRITICAL LOW: check for leaks or pump failure"
        } else if value < NORMAL_PRESSURE_LOW {
            "Low pressure"
        } else if value <= NORMAL_PRESSURE_HIGH {
            "Normal pressure"
        } else if value < CRITICAL_PRESSURE {
            "Elevated pressure"
        } else {
            "CRITICAL HIGH: possible blockage"
        }
    }

    fn status_for(value: f64) -> DeviceStatus {
        if value < MIN_SAFE_PRESSURE {
            DeviceStatus::Critical
        } else if value < NORMAL_PRESSURE_LOW {
            DeviceStatus::Warning
        } else if value <= NORMAL_PRESSURE_HIGH {
            DeviceStatus::Online
        } else if value < CRITICAL_PRESSURE {
            DeviceStatus::Warning
        } else {
            DeviceStatus::Critical
        }
    }
}

#[async_trait]
impl Device for PressureSensor {
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

        let value = value.clamp(0.0, MAX_PRESSURE);
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
                format!("pressure changed: {value:.2} bar"),
            );
        }

        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.core.base_telemetry();
        telemetry.insert("pressureReading".into(), json!(self.current_reading()));
        telemetry.insert("pressureUnit".into(), json!("bar"));
        telemetry.insert(
            "pressureStatus".into(),
            json!(self.pressure_status_description()),
        );
        telemetry
    }
}
