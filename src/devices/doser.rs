// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Chemical doser - reacts automatically to pH excursions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::warn;

use crate::core::{EventBus, Signal, Subscription, SystemEventType};
use crate::error::Result;

use super::ph::{LOWER_SAFE_PH, UPPER_SAFE_PH};
use super::{Controllable, Device, DeviceCore, DeviceStatus, PhSensor, Telemetry};

/// Observation link to a pH sensor's reading-change signal. Weak on the
/// signal so the link never keeps a removed sensor alive.
struct PhLink {
    signal: Weak<Signal<f64>>,
    subscription: Subscription,
}

/// State shared between the doser handle and its pH callback.
struct DoserState {
    active: AtomicBool,
    state_changed: Signal<bool>,
}

impl DoserState {
    /// Flip the active flag. On a transition the status goes Online (an
    /// inactive doser is standing by, not offline), the state-change signal
    /// fires and a StateChange event is published. Idempotent: returns
    /// false, with no event, when already in the target state.
    fn set_active(&self, core: &DeviceCore, active: bool) -> bool {
        let was_active = self.active.swap(active, Ordering::Relaxed);
        if was_active == active {
            return false;
        }
        core.set_status(DeviceStatus::Online);
        self.state_changed.emit(&active);
        core.bus().publish(
            core.name(),
            SystemEventType::StateChange,
            format!("doser {}", if active { "ACTIVATED" } else { "DEACTIVATED" }),
        );
        true
    }

    /// pH callback: engage outside the safe band, stand down inside it.
    fn on_ph_reading(&self, core: &DeviceCore, ph: f64) {
        let out_of_range = !(LOWER_SAFE_PH..=UPPER_SAFE_PH).contains(&ph);
        if out_of_range {
            if self.set_active(core, true) {
                core.bus().publish(
                    core.name(),
                    SystemEventType::AutomaticAction,
                    format!("auto-activated: pH {ph:.2} out of range"),
                );
            }
        } else if self.set_active(core, false) {
            core.bus().publish(
                core.name(),
                SystemEventType::AutomaticAction,
                format!("auto-deactivated: pH {ph:.2} back in range"),
            );
        }
    }
}

/// Chemical doser driven by a linked pH sensor.
///
/// The doser has no simulation feed of its own: its state changes come from
/// the observation link (automatic) or the control surface (manual). Both
/// paths fire the same state-change signal, so typed subscribers cannot
/// tell them apart; the bus additionally records the cause as
/// UserAction / AutomaticAction.
pub struct ChemicalDoser {
    core: Arc<DeviceCore>,
    state: Arc<DoserState>,
    link: Mutex<Option<PhLink>>,
}

impl ChemicalDoser {
    /// Construct an inactive doser.
    pub fn new(name: &str, bus: Arc<EventBus>) -> Self {
        Self {
            core: Arc::new(DeviceCore::new(name, "ChemicalDoser", None, bus)),
            state: Arc::new(DoserState {
                active: AtomicBool::new(false),
                state_changed: Signal::new(),
            }),
            link: Mutex::new(None),
        }
    }

    /// Whether the doser is currently dosing.
    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::Relaxed)
    }

    /// Activation state-change signal, fired for manual and automatic
    /// transitions alike.
    pub fn state_changed(&self) -> &Signal<bool> {
        &self.state.state_changed
    }

    /// Link this doser to a pH sensor. Any previous link is unsubscribed
    /// first so re-linking can never produce duplicate callback delivery.
    pub fn link_ph_sensor(&self, sensor: &PhSensor) {
        let mut link = self.link.lock();
        if let Some(old) = link.take() {
            if let Some(signal) = old.signal.upgrade() {
                signal.unsubscribe(old.subscription);
            }
        }

        let core = Arc::clone(&self.core);
        let state = Arc::clone(&self.state);
        let signal = sensor.reading_changed();
        let subscription = signal.subscribe(move |ph| state.on_ph_reading(&core, *ph));
        *link = Some(PhLink {
            signal: Arc::downgrade(signal),
            subscription,
        });
    }

    /// Drop the observation link, if any.
    pub fn unlink_ph_sensor(&self) {
        if let Some(old) = self.link.lock().take() {
            if let Some(signal) = old.signal.upgrade() {
                signal.unsubscribe(old.subscription);
            }
        }
    }

    /// Manually start dosing. No-op (and no event) if already active.
    pub fn activate(&self) {
        if self.state.set_active(&self.core, true) {
            self.core.bus().publish(
                self.name(),
                SystemEventType::UserAction,
                "doser manually activated",
            );
        }
    }

    /// Manually stop dosing. No-op (and no event) if already inactive.
    pub fn deactivate(&self) {
        if self.state.set_active(&self.core, false) {
            self.core.bus().publish(
                self.name(),
                SystemEventType::UserAction,
                "doser manually deactivated",
            );
        }
    }
}

#[async_trait]
impl Device for ChemicalDoser {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    async fn update(&self) -> Result<()> {
        // State changes arrive through the pH link; the tick only proves
        // liveness.
        if !self.is_running() {
            return Ok(());
        }
        self.core.touch();
        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.core.base_telemetry();
        telemetry.insert("isActive".into(), json!(self.is_active()));
        telemetry
    }

    fn as_controllable(&self) -> Option<&dyn Controllable> {
        Some(self)
    }
}

impl Controllable for ChemicalDoser {
    fn turn_on(&self) {
        self.core.set_running(true);
        self.set_status(DeviceStatus::Online);
        self.core
            .bus()
            .publish(self.name(), SystemEventType::UserAction, "doser turned ON");
    }

    fn turn_off(&self) {
        // The active flag is the doser's only setpoint; force it down
        // before parking.
        self.state.set_active(&self.core, false);
        self.core.set_running(false);
        self.set_status(DeviceStatus::Offline);
        self.core
            .bus()
            .publish(self.name(), SystemEventType::UserAction, "doser turned OFF");
    }

    fn set_config(&self, name: &str, value: Value) -> Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "active" => {
                if let Some(active) = value.as_bool() {
                    if active {
                        self.activate();
                    } else {
                        self.deactivate();
                    }
                }
            }
            other => warn!("{}: unknown config parameter: {}", self.name(), other),
        }
        Ok(())
    }

    fn get_config(&self, name: &str) -> Option<Value> {
        match name.to_ascii_lowercase().as_str() {
            "active" | "isactive" => Some(json!(self.is_active())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn ph_sensor_with_values(values: &[&str], bus: &Arc<EventBus>) -> (PhSensor, NamedTempFile) {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,phValue,status").unwrap();
        for (i, value) in values.iter().enumerate() {
            writeln!(file, "t{i},{value},ok").unwrap();
        }
        file.flush().unwrap();

        let sensor = PhSensor::new("Main pH Sensor", file.path(), Arc::clone(bus)).unwrap();
        sensor.initialize();
        sensor.start();
        (sensor, file)
    }

    #[tokio::test]
    async fn test_ph_excursion_activates_exactly_once() {
        let bus = Arc::new(EventBus::new(64));
        let (sensor, _file) = ph_sensor_with_values(&["7.0", "9.0", "9.0", "7.0"], &bus);
        let doser = ChemicalDoser::new("Chemical Doser", Arc::clone(&bus));
        doser.link_ph_sensor(&sensor);

        let transitions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&transitions);
        doser.state_changed().subscribe(move |v| sink.lock().push(*v));

        for _ in 0..4 {
            sensor.update().await.unwrap();
        }

        // Activated on the excursion to 9.0, deactivated on the return to
        // 7.0; the repeated 9.0 causes nothing.
        assert_eq!(*transitions.lock(), vec![true, false]);
        assert!(!doser.is_active());
    }

    #[tokio::test]
    async fn test_low_ph_also_activates() {
        let bus = Arc::new(EventBus::new(64));
        let (sensor, _file) = ph_sensor_with_values(&["6.0"], &bus);
        let doser = ChemicalDoser::new("Chemical Doser", Arc::clone(&bus));
        doser.link_ph_sensor(&sensor);

        sensor.update().await.unwrap();
        assert!(doser.is_active());
    }

    #[test]
    fn test_manual_activation_is_idempotent() {
        let bus = Arc::new(EventBus::new(64));
        let doser = ChemicalDoser::new("Chemical Doser", bus);

        let transitions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&transitions);
        doser.state_changed().subscribe(move |v| sink.lock().push(*v));

        doser.activate();
        doser.activate();
        doser.deactivate();
        doser.deactivate();

        assert_eq!(*transitions.lock(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_relink_unsubscribes_old_sensor() {
        let bus = Arc::new(EventBus::new(64));
        let (first, _f1) = ph_sensor_with_values(&["9.0"], &bus);
        let (second, _f2) = ph_sensor_with_values(&["7.0"], &bus);
        let doser = ChemicalDoser::new("Chemical Doser", Arc::clone(&bus));

        doser.link_ph_sensor(&first);
        doser.link_ph_sensor(&second);
        assert_eq!(first.reading_changed().subscriber_count(), 0);
        assert_eq!(second.reading_changed().subscriber_count(), 1);

        // The old sensor's excursion no longer reaches the doser.
        first.update().await.unwrap();
        assert!(!doser.is_active());
    }

    #[test]
    fn test_turn_off_deactivates() {
        let bus = Arc::new(EventBus::new(64));
        let doser = ChemicalDoser::new("Chemical Doser", bus);
        doser.turn_on();
        doser.activate();

        doser.turn_off();
        assert!(!doser.is_active());
        assert_eq!(doser.status(), DeviceStatus::Offline);
    }

    #[test]
    fn test_config_surface() {
        let bus = Arc::new(EventBus::new(64));
        let doser = ChemicalDoser::new("Chemical Doser", bus);

        doser.set_config("Active", json!(true)).unwrap();
        assert!(doser.is_active());
        assert_eq!(doser.get_config("isActive"), Some(json!(true)));
        assert_eq!(doser.get_config("bogus"), None);
    }
}
