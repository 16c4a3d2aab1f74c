// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Chlorine dosing pump with residual-chlorine monitoring

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::warn;

use crate::core::{EventBus, Signal, SystemEventType};
use crate::error::{DeviceError, Result};

use super::{
    Controllable, Device, DeviceCore, DeviceStatus, SimFileSource, Telemetry, READING_EPSILON,
    SETPOINT_EPSILON,
};

/// Lowest dosing rate setpoint in percent.
pub const MIN_DOSING_RATE: f64 = 0.0;
/// Highest dosing rate setpoint in percent.
pub const MAX_DOSING_RATE: f64 = 100.0;

/// Chlorine pump dosing disinfectant into the treatment train.
///
/// Beyond the on/off and dosing-rate control surface it monitors the
/// residual chlorine level reported by the simulation. Record layout:
/// `timestamp,chlorineLevel,dosingRate,isRunning,status`; the feed records
/// the dosing rate as a 0-1 fraction and it is scaled to percent here. The
/// trailing status column is a hint that can force Warning or Error.
pub struct ChlorinePump {
    core: DeviceCore,
    on: AtomicBool,
    dosing_rate: Mutex<f64>,
    chlorine_level: Mutex<f64>,
    state_changed: Arc<Signal<bool>>,
    dosing_rate_changed: Arc<Signal<f64>>,
    chlorine_level_changed: Arc<Signal<f64>>,
}

impl ChlorinePump {
    /// Open the simulation feed and construct the pump switched off.
    pub fn new(name: &str, path: impl Into<PathBuf>, bus: Arc<EventBus>) -> Result<Self> {
        let source = SimFileSource::open(path)?;
        Ok(Self {
            core: DeviceCore::new(name, "ChlorinePump", Some(source), bus),
            on: AtomicBool::new(false),
            dosing_rate: Mutex::new(0.0),
            chlorine_level: Mutex::new(0.0),
            state_changed: Arc::new(Signal::new()),
            dosing_rate_changed: Arc::new(Signal::new()),
            chlorine_level_changed: Arc::new(Signal::new()),
        })
    }

    /// Whether the pump motor is on.
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    /// Current dosing rate setpoint in percent.
    pub fn dosing_rate(&self) -> f64 {
        *self.dosing_rate.lock()
    }

    /// Most recent residual chlorine level in mg/L.
    pub fn chlorine_level(&self) -> f64 {
        *self.chlorine_level.lock()
    }

    /// On/off state-change signal.
    pub fn state_changed(&self) -> &Arc<Signal<bool>> {
        &self.state_changed
    }

    /// Dosing-rate-change signal.
    pub fn dosing_rate_changed(&self) -> &Arc<Signal<f64>> {
        &self.dosing_rate_changed
    }

    /// Residual-chlorine-change signal.
    pub fn chlorine_level_changed(&self) -> &Arc<Signal<f64>> {
        &self.chlorine_level_changed
    }

    /// Set the dosing rate in percent. Fails with
    /// [`DeviceError::OutOfRange`] outside [0, 100]; the pump is unchanged.
    pub fn set_dosing_rate(&self, rate: f64) -> Result<()> {
        if !(MIN_DOSING_RATE..=MAX_DOSING_RATE).contains(&rate) {
            return Err(DeviceError::OutOfRange {
                name: "dosing rate",
                value: rate,
                min: MIN_DOSING_RATE,
                max: MAX_DOSING_RATE,
            });
        }

        self.apply_dosing_rate(rate);
        if self.is_on() {
            self.set_status(DeviceStatus::Online);
        } else {
            self.set_status(DeviceStatus::Offline);
        }
        self.core.touch();
        Ok(())
    }

    fn apply_dosing_rate(&self, rate: f64) {
        let previous = {
            let mut dosing = self.dosing_rate.lock();
            std::mem::replace(&mut *dosing, rate)
        };
        if (rate - previous).abs() > SETPOINT_EPSILON {
            self.dosing_rate_changed.emit(&rate);
            self.core.bus().publish(
                self.name(),
                SystemEventType::DataUpdate,
                format!("dosing rate changed: {rate:.1}%"),
            );
        }
    }

    fn apply_chlorine_level(&self, level: f64) {
        let previous = {
            let mut chlorine = self.chlorine_level.lock();
            std::mem::replace(&mut *chlorine, level)
        };
        if (level - previous).abs() > READING_EPSILON {
            self.chlorine_level_changed.emit(&level);
            self.core.bus().publish(
                self.name(),
                SystemEventType::DataUpdate,
                format!("chlorine level changed: {level:.2} mg/L"),
            );
        }
    }

    fn apply_on_state(&self, on: bool, event_type: SystemEventType) -> bool {
        let was_on = self.on.swap(on, Ordering::Relaxed);
        if was_on == on {
            return false;
        }
        self.state_changed.emit(&on);
        self.core.bus().publish(
            self.name(),
            event_type,
            format!("pump turned {}", if on { "ON" } else { "OFF" }),
        );
        true
    }
}

#[async_trait]
impl Device for ChlorinePump {
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
        if fields.len() < 4 {
            return Ok(());
        }

        if let Some(level) = fields.get(1).and_then(|f| f.trim().parse::<f64>().ok()) {
            self.apply_chlorine_level(level);
        }

        if let Some(fraction) = fields.get(2).and_then(|f| f.trim().parse::<f64>().ok()) {
            // The feed records dosing as a 0-1 fraction.
            let rate = (fraction * 100.0).clamp(MIN_DOSING_RATE, MAX_DOSING_RATE);
            self.apply_dosing_rate(rate);
        }

        if let Some(on) = fields.get(3).and_then(|f| f.trim().parse::<bool>().ok()) {
            self.apply_on_state(on, SystemEventType::StateChange);
            self.core.set_running(on);
            if on {
                self.set_status(DeviceStatus::Online);
            } else {
                self.set_status(DeviceStatus::Offline);
                *self.dosing_rate.lock() = 0.0;
            }
        }

        if let Some(hint) = fields.get(4) {
            match hint.trim().to_ascii_lowercase().as_str() {
                "critical" | "error" => self.set_status(DeviceStatus::Error),
                "warning" => self.set_status(DeviceStatus::Warning),
                _ => {}
            }
        }

        self.core.touch();
        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.core.base_telemetry();
        telemetry.insert("isOn".into(), json!(self.is_on()));
        telemetry.insert("dosingRate".into(), json!(self.dosing_rate()));
        telemetry.insert("chlorineLevel".into(), json!(self.chlorine_level()));
        telemetry
    }

    fn as_controllable(&self) -> Option<&dyn Controllable> {
        Some(self)
    }
}

impl Controllable for ChlorinePump {
    fn turn_on(&self) {
        if self.is_on() {
            return;
        }
        self.core.set_running(true);
        self.set_status(DeviceStatus::Online);
        self.apply_on_state(true, SystemEventType::UserAction);
    }

    fn turn_off(&self) {
        if !self.is_on() {
            return;
        }
        self.core.set_running(false);
        *self.dosing_rate.lock() = 0.0;
        self.set_status(DeviceStatus::Offline);
        self.apply_on_state(false, SystemEventType::UserAction);
        self.dosing_rate_changed.emit(&0.0);
        self.core.bus().publish(
            self.name(),
            SystemEventType::DataUpdate,
            "dosing rate changed: 0.0%",
        );
    }

    fn set_config(&self, name: &str, value: Value) -> Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "dosingrate" => {
                if let Some(rate) = value.as_f64() {
                    self.set_dosing_rate(rate)?;
                }
            }
            "ison" | "on" => {
                if let Some(on) = value.as_bool() {
                    if on {
                        self.turn_on();
                    } else {
                        self.turn_off();
                    }
                }
            }
            other => warn!("{}: unknown config parameter: {}", self.name(), other),
        }
        Ok(())
    }

    fn get_config(&self, name: &str) -> Option<Value> {
        match name.to_ascii_lowercase().as_str() {
            "dosingrate" => Some(json!(self.dosing_rate())),
            "chlorinelevel" => Some(json!(self.chlorine_level())),
            "ison" | "on" => Some(json!(self.is_on())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn pump_with_records(records: &[&str]) -> (ChlorinePump, NamedTempFile) {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,chlorineLevel,dosingRate,isRunning,status").unwrap();
        for record in records {
            writeln!(file, "{record}").unwrap();
        }
        file.flush().unwrap();

        let pump = ChlorinePump::new("Chlorine Pump", file.path(), Arc::new(EventBus::new(64)))
            .unwrap();
        pump.initialize();
        (pump, file)
    }

    #[tokio::test]
    async fn test_dosing_rate_scaled_from_fraction() {
        let (pump, _file) = pump_with_records(&["t1,0.8,0.45,true,ok"]);
        pump.start();

        pump.update().await.unwrap();
        assert_eq!(pump.dosing_rate(), 45.0);
        assert_eq!(pump.chlorine_level(), 0.8);
        assert!(pump.is_on());
    }

    #[tokio::test]
    async fn test_status_hint_overrides() {
        let (pump, _file) =
            pump_with_records(&["t1,0.8,0.45,true,warning", "t2,0.8,0.45,true,critical"]);
        pump.start();

        pump.update().await.unwrap();
        assert_eq!(pump.status(), DeviceStatus::Warning);
        pump.update().await.unwrap();
        assert_eq!(pump.status(), DeviceStatus::Error);
    }

    #[tokio::test]
    async fn test_chlorine_level_epsilon() {
        let (pump, _file) =
            pump_with_records(&["t1,0.80,0.0,true,ok", "t2,0.805,0.0,true,ok", "t3,0.90,0.0,true,ok"]);
        pump.start();

        let levels = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&levels);
        pump.chlorine_level_changed().subscribe(move |v| sink.lock().push(*v));

        for _ in 0..3 {
            pump.update().await.unwrap();
        }
        // 0.80 -> 0.805 is below the precision epsilon.
        assert_eq!(*levels.lock(), vec![0.80, 0.90]);
    }

    #[test]
    fn test_set_dosing_rate_bounds() {
        let (pump, _file) = pump_with_records(&[]);

        assert!(matches!(
            pump.set_dosing_rate(101.0),
            Err(DeviceError::OutOfRange { .. })
        ));
        pump.set_dosing_rate(100.0).unwrap();
        assert_eq!(pump.dosing_rate(), 100.0);
    }

    #[test]
    fn test_turn_off_zeroes_dosing_rate() {
        let (pump, _file) = pump_with_records(&[]);
        let rates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&rates);
        pump.dosing_rate_changed().subscribe(move |v| sink.lock().push(*v));

        pump.turn_on();
        pump.set_dosing_rate(30.0).unwrap();
        pump.turn_off();

        assert_eq!(pump.dosing_rate(), 0.0);
        assert_eq!(*rates.lock(), vec![30.0, 0.0]);
        assert_eq!(pump.status(), DeviceStatus::Offline);
    }
}
