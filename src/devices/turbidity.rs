// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Filtration turbidity sensor with edge-triggered threshold alerts

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::core::{EventBus, Signal, SystemEventType};
use crate::error::Result;

use super::{Device, DeviceCore, DeviceStatus, SimFileSource, Telemetry, READING_EPSILON};

/// Lowest reportable turbidity in NTU.
pub const MIN_TURBIDITY: f64 = 0.0;
/// Highest reportable turbidity in NTU.
pub const MAX_TURBIDITY: f64 = 10.0;
/// Default alert threshold; 90% of range is always Critical.
pub const DEFAULT_ALERT_THRESHOLD: f64 = 5.0;

const CRITICAL_TURBIDITY: f64 = MAX_TURBIDITY * 0.9;

/// Turbidity sensor for the filtration stage.
///
/// Besides the usual level-style reading-change signal, this sensor raises
/// two edge-triggered signals: `threshold_alert` fires once when turbidity
/// crosses above the alert threshold and `threshold_cleared` once on the way
/// back down, letting subscribers distinguish level from edge.
/// Record layout: `timestamp,turbidity,status`.
pub struct TurbiditySensor {
    core: DeviceCore,
    current: Mutex<f64>,
    alert_threshold: Mutex<f64>,
    alert_active: AtomicBool,
    reading_changed: Arc<Signal<f64>>,
    threshold_alert: Arc<Signal<f64>>,
    threshold_cleared: Arc<Signal<f64>>,
}

impl TurbiditySensor {
    /// Open the simulation feed with an explicit alert threshold.
    pub fn with_threshold(
        name: &str,
        path: impl Into<PathBuf>,
        bus: Arc<EventBus>,
        alert_threshold: f64,
    ) -> Result<Self> {
        let source = SimFileSource::open(path)?;
        Ok(Self {
            core: DeviceCore::new(name, "TurbiditySensor", Some(source), bus),
            current: Mutex::new(0.0),
            alert_threshold: Mutex::new(alert_threshold),
            alert_active: AtomicBool::new(false),
            reading_changed: Arc::new(Signal::new()),
            threshold_alert: Arc::new(Signal::new()),
            threshold_cleared: Arc::new(Signal::new()),
        })
    }

    /// Open the simulation feed with the default 5.0 NTU alert threshold.
    pub fn new(name: &str, path: impl Into<PathBuf>, bus: Arc<EventBus>) -> Result<Self> {
        Self::with_threshold(name, path, bus, DEFAULT_ALERT_THRESHOLD)
    }

    /// Current turbidity in NTU.
    pub fn current_reading(&self) -> f64 {
        *self.current.lock()
    }

    /// The alert threshold in NTU.
    pub fn alert_threshold(&self) -> f64 {
        *self.alert_threshold.lock()
    }

    /// Adjust the alert threshold. Takes effect from the next tick.
    pub fn set_alert_threshold(&self, threshold: f64) {
        *self.alert_threshold.lock() = threshold;
    }

    /// Whether turbidity currently sits above the alert threshold.
    pub fn is_alert_active(&self) -> bool {
        self.alert_active.load(Ordering::Relaxed)
    }

    /// Level-style reading-change signal.
    pub fn reading_changed(&self) -> &Arc<Signal<f64>> {
        &self.reading_changed
    }

    /// Rising-edge signal: turbidity crossed above the alert threshold.
    pub fn threshold_alert(&self) -> &Arc<Signal<f64>> {
        &self.threshold_alert
    }

    /// Falling-edge signal: turbidity dropped back below the threshold.
    pub fn threshold_cleared(&self) -> &Arc<Signal<f64>> {
        &self.threshold_cleared
    }

    fn status_for(&self, value: f64) -> DeviceStatus {
        if value > CRITICAL_TURBIDITY {
            DeviceStatus::Critical
        } else if value > self.alert_threshold() {
            DeviceStatus::Warning
        } else {
            DeviceStatus::Online
        }
    }

    fn check_threshold_edges(&self, value: f64) {
        let threshold = self.alert_threshold();
        let active = value > threshold;
        let was_active = self.alert_active.swap(active, Ordering::Relaxed);

        if active && !was_active {
            self.threshold_alert.emit(&value);
            self.core.bus().publish(
                self.name(),
                SystemEventType::Alert,
                format!("turbidity {value:.2} NTU exceeds threshold {threshold:.1} NTU"),
            );
        } else if !active && was_active {
            self.threshold_cleared.emit(&value);
            self.core.bus().publish(
                self.name(),
                SystemEventType::Info,
                format!("turbidity {value:.2} NTU back below threshold {threshold:.1} NTU"),
            );
        }
    }
}

#[async_trait]
impl Device for TurbiditySensor {
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

        let value = value.clamp(MIN_TURBIDITY, MAX_TURBIDITY);
        let previous = {
            let mut current = self.current.lock();
            std::mem::replace(&mut *current, value)
        };

        self.set_status(self.status_for(value));
        self.check_threshold_edges(value);
        self.core.touch();

        if (value - previous).abs() > READING_EPSILON {
            self.reading_changed.emit(&value);
            self.core.bus().publish(
                self.name(),
                SystemEventType::DataUpdate,
                format!("turbidity changed: {value:.2} NTU"),
            );
        }

        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.core.base_telemetry();
        telemetry.insert("turbidity".into(), json!(self.current_reading()));
        telemetry.insert("alertThreshold".into(), json!(self.alert_threshold()));
        telemetry.insert("isAlertActive".into(), json!(self.is_alert_active()));
        telemetry
    }
}
