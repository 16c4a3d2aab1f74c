// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Process water temperature sensor

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::core::{EventBus, Signal, SystemEventType};
use crate::error::Result;

use super::{Device, DeviceCore, DeviceStatus, SimFileSource, Telemetry, READING_EPSILON};

/// Lowest temperature the probe reports; readings clamp up to this.
pub const MIN_TEMP: f64 = 18.0;
/// Highest temperature the probe reports; readings clamp down to this.
pub const MAX_TEMP: f64 = 24.0;
/// From here up the process water is too warm to treat safely.
pub const CRITICAL_TEMP: f64 = 23.0;
/// From here up the temperature needs watching.
pub const WARNING_TEMP: f64 = 22.0;

/// Water temperature sensor fed by a simulation file.
///
/// Record layout: `timestamp,temperature,status`; readings are clamped to
/// [18, 24] degrees C.
pub struct TempSensor {
    core: DeviceCore,
    current: Mutex<f64>,
    reading_changed: Arc<Signal<f64>>,
}

impl TempSensor {
    /// Open the simulation feed and construct the sensor at a cool reading.
    pub fn new(name: &str, path: impl Into<PathBuf>, bus: Arc<EventBus>) -> Result<Self> {
        let source = SimFileSource::open(path)?;
        Ok(Self {
            core: DeviceCore::new(name, "TempSensor", Some(source), bus),
            current: Mutex::new(20.0),
            reading_changed: Arc::new(Signal::new()),
        })
    }

    /// Current temperature in degrees C.
    pub fn current_reading(&self) -> f64 {
        *self.current.lock()
    }

    /// Reading-change signal.
    pub fn reading_changed(&self) -> &Arc<Signal<f64>> {
        &self.reading_changed
    }

    fn status_for(value: f64) -> DeviceStatus {
        if value >= CRITICAL_TEMP {
            DeviceStatus::Critical
        } else if value >= WARNING_TEMP {
            DeviceStatus::Warning
        } else {
            DeviceStatus::Online
        }
    }
}

#[async_trait]
impl Device for TempSensor {
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

        let value = value.clamp(MIN_TEMP, MAX_TEMP);
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
                format!("temperature changed: {value:.1} C"),
            );
        }

        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.core.base_telemetry();
        telemetry.insert("tempReading".into(), json!(self.current_reading()));
        telemetry.insert("tempUnit".into(), json!("C"));
        telemetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn sensor_with_values(values: &[&str]) -> (TempSensor, NamedTempFile) {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,temperature,status").unwrap();
        for (i, value) in values.iter().enumerate() {
            writeln!(file, "t{i},{value},ok").unwrap();
        }
        file.flush().unwrap();

        let sensor = TempSensor::new("Basin Temp", file.path(), Arc::new(EventBus::new(64)))
            .unwrap();
        sensor.initialize();
        sensor.start();
        (sensor, file)
    }

    #[tokio::test]
    async fn test_status_bands() {
        let (sensor, _file) = sensor_with_values(&["21.9", "22.0", "22.9", "23.0", "23.8"]);

        let expected = [
            DeviceStatus::Online,
            DeviceStatus::Warning,
            DeviceStatus::Warning,
            DeviceStatus::Critical,
            DeviceStatus::Critical,
        ];
        for status in expected {
            sensor.update().await.unwrap();
            assert_eq!(sensor.status(), status, "at {}", sensor.current_reading());
        }
    }

    #[tokio::test]
    async fn test_clamped_to_probe_range() {
        let (sensor, _file) = sensor_with_values(&["31.0", "4.0"]);

        sensor.update().await.unwrap();
        assert_eq!(sensor.current_reading(), MAX_TEMP);
        sensor.update().await.unwrap();
        assert_eq!(sensor.current_reading(), MIN_TEMP);
    }
}
