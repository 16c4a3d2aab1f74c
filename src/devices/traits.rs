// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Device traits and shared lifecycle state

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::core::EventBus;
use crate::error::Result;

use super::SimFileSource;

/// Operational status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// Not running, or deliberately parked.
    Offline,
    /// Running with readings in the normal band.
    Online,
    /// Readings outside the normal band but not yet dangerous.
    Warning,
    /// Readings in the critical band.
    Critical,
    /// The last update pass failed.
    Error,
    /// Taken out of service for maintenance.
    Maintenance,
}

/// Flat snapshot of a device's publicly relevant fields.
pub type Telemetry = HashMap<String, Value>;

/// Lifecycle state shared by every device.
///
/// Each concrete device embeds one of these and drives its own domain fields
/// around it. All mutation funnels through the owning device's update and
/// control methods; the scheduler and other observers only read.
pub struct DeviceCore {
    name: String,
    device_type: &'static str,
    status: Mutex<DeviceStatus>,
    running: AtomicBool,
    last_update: Mutex<Option<DateTime<Utc>>>,
    source: Option<Mutex<SimFileSource>>,
    bus: Arc<EventBus>,
}

impl DeviceCore {
    /// Build the shared state for a device, optionally wired to a
    /// simulation feed.
    pub fn new(
        name: impl Into<String>,
        device_type: &'static str,
        source: Option<SimFileSource>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            name: name.into(),
            device_type,
            status: Mutex::new(DeviceStatus::Offline),
            running: AtomicBool::new(false),
            last_update: Mutex::new(None),
            source: source.map(Mutex::new),
            bus,
        }
    }

    /// Device name (unique across the registry, case-insensitive).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device type tag.
    pub fn device_type(&self) -> &'static str {
        self.device_type
    }

    /// Current status.
    pub fn status(&self) -> DeviceStatus {
        *self.status.lock()
    }

    /// Overwrite the status.
    pub fn set_status(&self, status: DeviceStatus) {
        *self.status.lock() = status;
    }

    /// Whether the update loop does work for this device.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Gate or ungate the update loop.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    /// Timestamp of the most recent successful tick.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.lock()
    }

    /// Stamp the last-update timestamp with the current time.
    pub fn touch(&self) {
        *self.last_update.lock() = Some(Utc::now());
    }

    /// The system event bus this device publishes to.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Pull one record from the simulation feed. Read errors degrade to
    /// "no update this tick" with a warning rather than stalling the device.
    pub fn next_record(&self) -> Option<String> {
        let source = self.source.as_ref()?;
        match source.lock().read_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("{}: simulation read failed: {}", self.name, e);
                None
            }
        }
    }

    /// Telemetry fields common to every device.
    pub fn base_telemetry(&self) -> Telemetry {
        let last_update = self
            .last_update()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        let mut telemetry = Telemetry::new();
        telemetry.insert("name".into(), json!(self.name));
        telemetry.insert("type".into(), json!(self.device_type));
        telemetry.insert("status".into(), json!(self.status()));
        telemetry.insert("isRunning".into(), json!(self.is_running()));
        telemetry.insert("lastUpdate".into(), json!(last_update));
        telemetry
    }
}

/// Contract implemented by every device in the plant.
///
/// The lifecycle is a small state machine: devices are constructed Offline,
/// `initialize` brings them Online without starting the polling loop,
/// `start`/`stop` gate whether [`update`](Self::update) does any work. The
/// scheduler calls `update` once per tick for every registered device.
#[async_trait]
pub trait Device: Send + Sync {
    /// Shared lifecycle state.
    fn core(&self) -> &DeviceCore;

    /// Pull and process one simulated record. Must be a no-op while the
    /// device is not running; internal parse failures are recovered by
    /// skipping the tick. An `Err` here is an unexpected fault, absorbed at
    /// the scheduler boundary.
    async fn update(&self) -> Result<()>;

    /// Flat snapshot of all publicly relevant fields. Never fails; a device
    /// with no data yet reports its defaults.
    fn telemetry(&self) -> Telemetry;

    /// Device name.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Device type tag.
    fn device_type(&self) -> &'static str {
        self.core().device_type()
    }

    /// Current status.
    fn status(&self) -> DeviceStatus {
        self.core().status()
    }

    /// Overwrite the status. Used by the scheduler to mark a faulted device.
    fn set_status(&self, status: DeviceStatus) {
        self.core().set_status(status);
    }

    /// Whether the update loop does work for this device.
    fn is_running(&self) -> bool {
        self.core().is_running()
    }

    /// Timestamp of the most recent successful tick.
    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.core().last_update()
    }

    /// Bring the device Online and stamp it. Does not start polling.
    fn initialize(&self) {
        self.core().set_status(DeviceStatus::Online);
        self.core().touch();
    }

    /// Enable the update loop.
    fn start(&self) {
        self.core().set_running(true);
        self.core().set_status(DeviceStatus::Online);
    }

    /// Disable the update loop and park the device.
    fn stop(&self) {
        self.core().set_running(false);
        self.core().set_status(DeviceStatus::Offline);
    }

    /// Downcast to the controllable surface, if this device has one.
    fn as_controllable(&self) -> Option<&dyn Controllable> {
        None
    }
}

/// Control surface for devices that can be switched and tuned.
pub trait Controllable: Device {
    /// Switch the device on. Idempotent.
    fn turn_on(&self);

    /// Switch the device off. Idempotent. Forces every setpoint to zero,
    /// sets the status to Offline and fires a zero-value setpoint event.
    fn turn_off(&self);

    /// Push a named configuration value. Keys are matched
    /// case-insensitively; unknown keys are logged and ignored.
    fn set_config(&self, name: &str, value: Value) -> Result<()>;

    /// Read a named configuration value.
    fn get_config(&self, name: &str) -> Option<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDevice {
        core: DeviceCore,
    }

    #[async_trait]
    impl Device for NullDevice {
        fn core(&self) -> &DeviceCore {
            &self.core
        }

        async fn update(&self) -> Result<()> {
            Ok(())
        }

        fn telemetry(&self) -> Telemetry {
            self.core.base_telemetry()
        }
    }

    fn null_device() -> NullDevice {
        NullDevice {
            core: DeviceCore::new("Test Device", "NullDevice", None, Arc::new(EventBus::new(4))),
        }
    }

    #[test]
    fn test_lifecycle_state_machine() {
        let device = null_device();
        assert_eq!(device.status(), DeviceStatus::Offline);
        assert!(!device.is_running());
        assert!(device.last_update().is_none());

        device.initialize();
        assert_eq!(device.status(), DeviceStatus::Online);
        assert!(!device.is_running());
        assert!(device.last_update().is_some());

        device.start();
        assert!(device.is_running());
        assert_eq!(device.status(), DeviceStatus::Online);

        device.stop();
        assert!(!device.is_running());
        assert_eq!(device.status(), DeviceStatus::Offline);
    }

    #[test]
    fn test_fresh_device_telemetry_has_defaults() {
        let device = null_device();
        let telemetry = device.telemetry();
        assert_eq!(telemetry["name"], json!("Test Device"));
        assert_eq!(telemetry["type"], json!("NullDevice"));
        assert_eq!(telemetry["status"], json!("Offline"));
        assert_eq!(telemetry["isRunning"], json!(false));
        assert_eq!(telemetry["lastUpdate"], json!(""));
    }
}
