// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Raw water intake pump

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
    Controllable, Device, DeviceCore, DeviceStatus, SimFileSource, Telemetry, SETPOINT_EPSILON,
};

/// Lowest flow rate setpoint in percent.
pub const MIN_FLOW_RATE: f64 = 0.0;
/// Highest flow rate setpoint in percent.
pub const MAX_FLOW_RATE: f64 = 100.0;

/// Intake pump feeding raw water into the treatment train.
///
/// The pump is an actuator and a sensor of its own state at once: operator
/// pushes (`turn_on`, `set_flow_rate`, `set_config`) and simulation-driven
/// updates (record layout `timestamp,flowRate,isRunning,pressure,status`)
/// funnel through the same internal setters, so both re-evaluate status and
/// fire the same events.
pub struct IntakePump {
    core: DeviceCore,
    on: AtomicBool,
    flow_rate: Mutex<f64>,
    state_changed: Arc<Signal<bool>>,
    flow_rate_changed: Arc<Signal<f64>>,
}

impl IntakePump {
    /// Open the simulation feed and construct the pump switched off.
    pub fn new(name: &str, path: impl Into<PathBuf>, bus: Arc<EventBus>) -> Result<Self> {
        let source = SimFileSource::open(path)?;
        Ok(Self {
            core: DeviceCore::new(name, "IntakePump", Some(source), bus),
            on: AtomicBool::new(false),
            flow_rate: Mutex::new(0.0),
            state_changed: Arc::new(Signal::new()),
            flow_rate_changed: Arc::new(Signal::new()),
        })
    }

    /// Whether the pump motor is on.
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    /// Current flow rate setpoint in percent.
    pub fn flow_rate(&self) -> f64 {
        *self.flow_rate.lock()
    }

    /// On/off state-change signal.
    pub fn state_changed(&self) -> &Arc<Signal<bool>> {
        &self.state_changed
    }

    /// Flow-rate-change signal.
    pub fn flow_rate_changed(&self) -> &Arc<Signal<f64>> {
        &self.flow_rate_changed
    }

    /// Set the flow rate in percent. Fails with
    /// [`DeviceError::OutOfRange`] outside [0, 100]; the pump is unchanged.
    pub fn set_flow_rate(&self, rate: f64) -> Result<()> {
        if !(MIN_FLOW_RATE..=MAX_FLOW_RATE).contains(&rate) {
            return Err(DeviceError::OutOfRange {
                name: "flow rate",
                value: rate,
                min: MIN_FLOW_RATE,
                max: MAX_FLOW_RATE,
            });
        }

        self.apply_flow_rate(rate);
        if self.is_on() {
            self.set_status(DeviceStatus::Online);
        } else {
            self.set_status(DeviceStatus::Offline);
        }
        self.core.touch();
        Ok(())
    }

    /// Store a new flow rate and fire the change event when the movement is
    /// above the setpoint epsilon.
    fn apply_flow_rate(&self, rate: f64) {
        let previous = {
            let mut flow = self.flow_rate.lock();
            std::mem::replace(&mut *flow, rate)
        };
        if (rate - previous).abs() > SETPOINT_EPSILON {
            self.flow_rate_changed.emit(&rate);
            self.core.bus().publish(
                self.name(),
                SystemEventType::DataUpdate,
                format!("flow rate changed: {rate:.1}%"),
            );
        }
    }

    /// Flip the on/off state and fire the change event on a transition.
    /// Returns whether a transition happened.
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
impl Device for IntakePump {
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
        if fields.len() < 3 {
            return Ok(());
        }

        if let Some(rate) = fields.get(1).and_then(|f| f.trim().parse::<f64>().ok()) {
            self.apply_flow_rate(rate.clamp(MIN_FLOW_RATE, MAX_FLOW_RATE));
        }

        if let Some(on) = fields.get(2).and_then(|f| f.trim().parse::<bool>().ok()) {
            self.apply_on_state(on, SystemEventType::StateChange);
            self.core.set_running(on);
            if on {
                self.set_status(DeviceStatus::Online);
            } else {
                self.set_status(DeviceStatus::Offline);
                *self.flow_rate.lock() = 0.0;
            }
        }

        self.core.touch();
        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.core.base_telemetry();
        telemetry.insert("isOn".into(), json!(self.is_on()));
        telemetry.insert("flowRate".into(), json!(self.flow_rate()));
        telemetry
    }

    fn as_controllable(&self) -> Option<&dyn Controllable> {
        Some(self)
    }
}

impl Controllable for IntakePump {
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
        *self.flow_rate.lock() = 0.0;
        self.set_status(DeviceStatus::Offline);
        self.apply_on_state(false, SystemEventType::UserAction);
        // Always announce the forced-zero setpoint, even when the flow was
        // already below the event epsilon.
        self.flow_rate_changed.emit(&0.0);
        self.core.bus().publish(
            self.name(),
            SystemEventType::DataUpdate,
            "flow rate changed: 0.0%",
        );
    }

    fn set_config(&self, name: &str, value: Value) -> Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "flowrate" => {
                if let Some(rate) = value.as_f64() {
                    self.set_flow_rate(rate)?;
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
            "flowrate" => Some(json!(self.flow_rate())),
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

    fn pump_with_records(records: &[&str]) -> (IntakePump, NamedTempFile) {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,flowRate,isRunning,pressure,status").unwrap();
        for record in records {
            writeln!(file, "{record}").unwrap();
        }
        file.flush().unwrap();

        let pump = IntakePump::new("Main Intake Pump", file.path(), Arc::new(EventBus::new(64)))
            .unwrap();
        pump.initialize();
        (pump, file)
    }

    #[test]
    fn test_set_flow_rate_rejects_out_of_range() {
        let (pump, _file) = pump_with_records(&[]);

        assert!(matches!(
            pump.set_flow_rate(150.0),
            Err(DeviceError::OutOfRange { .. })
        ));
        assert!(matches!(
            pump.set_flow_rate(-1.0),
            Err(DeviceError::OutOfRange { .. })
        ));
        assert_eq!(pump.flow_rate(), 0.0);
    }

    #[test]
    fn test_turn_off_zeroes_flow_and_fires_event() {
        let (pump, _file) = pump_with_records(&[]);
        let flows = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&flows);
        pump.flow_rate_changed().subscribe(move |v| sink.lock().push(*v));

        pump.turn_on();
        pump.set_flow_rate(50.0).unwrap();
        pump.turn_off();

        assert_eq!(pump.flow_rate(), 0.0);
        assert_eq!(pump.status(), DeviceStatus::Offline);
        assert_eq!(*flows.lock(), vec![50.0, 0.0]);
    }

    #[test]
    fn test_turn_on_off_are_idempotent() {
        let (pump, _file) = pump_with_records(&[]);
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&transitions);
        pump.state_changed().subscribe(move |v| sink.lock().push(*v));

        pump.turn_on();
        pump.turn_on();
        pump.turn_off();
        pump.turn_off();

        assert_eq!(*transitions.lock(), vec![true, false]);
    }

    #[test]
    fn test_flow_event_suppressed_below_epsilon() {
        let (pump, _file) = pump_with_records(&[]);
        let flows = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&flows);
        pump.flow_rate_changed().subscribe(move |v| sink.lock().push(*v));

        pump.turn_on();
        pump.set_flow_rate(50.0).unwrap();
        pump.set_flow_rate(50.05).unwrap();
        pump.set_flow_rate(51.0).unwrap();

        assert_eq!(*flows.lock(), vec![50.0, 51.0]);
    }

    #[tokio::test]
    async fn test_simulation_drives_state() {
        let (pump, _file) = pump_with_records(&["t1,63.0,true,2.3,ok", "t2,0.0,false,2.1,ok"]);
        pump.start();

        pump.update().await.unwrap();
        assert!(pump.is_on());
        assert_eq!(pump.flow_rate(), 63.0);
        assert_eq!(pump.status(), DeviceStatus::Online);

        pump.update().await.unwrap();
        assert!(!pump.is_on());
        assert_eq!(pump.flow_rate(), 0.0);
        assert_eq!(pump.status(), DeviceStatus::Offline);
        // The simulation switched the pump off, so polling is parked.
        assert!(!pump.is_running());
    }

    #[test]
    fn test_config_round_trip() {
        let (pump, _file) = pump_with_records(&[]);

        pump.set_config("on", json!(true)).unwrap();
        pump.set_config("FlowRate", json!(40.0)).unwrap();

        assert_eq!(pump.get_config("flowrate"), Some(json!(40.0)));
        assert_eq!(pump.get_config("isOn"), Some(json!(true)));
        assert_eq!(pump.get_config("bogus"), None);

        // Out-of-range pushes via config surface the same error.
        assert!(pump.set_config("flowrate", json!(130.0)).is_err());
    }
}
