// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Polling scheduler - drives every registered device on one fixed interval

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::core::{DeviceRegistry, EventBus, SystemEventType};
use crate::devices::DeviceStatus;

/// Drives the periodic update of every device in the registry.
///
/// One tick walks a registry snapshot in registration order and awaits each
/// device's `update()` in turn. A device that returns an error is marked
/// [`DeviceStatus::Error`] and reported on the bus, and the tick moves on:
/// one faulting device never stalls the rest of the plant.
pub struct DeviceScheduler {
    registry: Arc<DeviceRegistry>,
    bus: Arc<EventBus>,
    interval: Duration,
}

impl DeviceScheduler {
    /// Create a scheduler over `registry` ticking every `interval`.
    pub fn new(registry: Arc<DeviceRegistry>, bus: Arc<EventBus>, interval: Duration) -> Self {
        Self {
            registry,
            bus,
            interval,
        }
    }

    /// The polling interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Initialize and start every registered device.
    pub fn start_all(&self) {
        for device in self.registry.all() {
            device.initialize();
            device.start();
        }
        info!("started {} devices", self.registry.len());
        self.bus.publish(
            "scheduler",
            SystemEventType::Info,
            format!("all {} devices started", self.registry.len()),
        );
    }

    /// Stop every registered device. Readings and setpoints are left as
    /// they are; only polling is parked.
    pub fn stop_all(&self) {
        for device in self.registry.all() {
            device.stop();
        }
        info!("stopped {} devices", self.registry.len());
        self.bus.publish(
            "scheduler",
            SystemEventType::Info,
            format!("all {} devices stopped", self.registry.len()),
        );
    }

    /// Run one polling pass over all devices.
    pub async fn tick(&self) {
        for device in self.registry.all() {
            if let Err(err) = device.update().await {
                warn!("device {} failed to update: {}", device.name(), err);
                device.set_status(DeviceStatus::Error);
                self.bus.publish(
                    device.name(),
                    SystemEventType::Error,
                    format!("update failed: {err}"),
                );
            }
        }
    }

    /// Start every device and tick until `shutdown` yields (or closes).
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        self.start_all();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("scheduler running, interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.recv() => {
                    debug!("scheduler received shutdown");
                    break;
                }
            }
        }
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;

    use crate::devices::{Device, DeviceCore, Telemetry};
    use crate::error::{DeviceError, Result};

    struct StubDevice {
        core: DeviceCore,
        updates: AtomicU64,
        fail: bool,
    }

    impl StubDevice {
        fn new(name: &str, fail: bool, bus: &Arc<EventBus>) -> Arc<Self> {
            Arc::new(Self {
                core: DeviceCore::new(name, "Stub", None, Arc::clone(bus)),
                updates: AtomicU64::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl Device for StubDevice {
        fn core(&self) -> &DeviceCore {
            &self.core
        }

        async fn update(&self) -> Result<()> {
            self.updates.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(DeviceError::Fault("stub failure".into()));
            }
            Ok(())
        }

        fn telemetry(&self) -> Telemetry {
            self.core.base_telemetry()
        }
    }

    #[tokio::test]
    async fn test_faulting_device_does_not_stop_the_tick() {
        let bus = Arc::new(EventBus::new(16));
        let registry = Arc::new(DeviceRegistry::new());
        let healthy_a = StubDevice::new("A", false, &bus);
        let broken = StubDevice::new("B", true, &bus);
        let healthy_c = StubDevice::new("C", false, &bus);
        registry.add(healthy_a.clone()).unwrap();
        registry.add(broken.clone()).unwrap();
        registry.add(healthy_c.clone()).unwrap();

        let scheduler =
            DeviceScheduler::new(Arc::clone(&registry), bus, Duration::from_millis(10));
        scheduler.tick().await;

        assert_eq!(healthy_a.updates.load(Ordering::Relaxed), 1);
        assert_eq!(broken.updates.load(Ordering::Relaxed), 1);
        assert_eq!(healthy_c.updates.load(Ordering::Relaxed), 1);
        assert_eq!(broken.status(), DeviceStatus::Error);
        assert_ne!(healthy_a.status(), DeviceStatus::Error);
    }

    #[tokio::test]
    async fn test_fault_is_reported_on_the_bus() {
        let bus = Arc::new(EventBus::new(16));
        let registry = Arc::new(DeviceRegistry::new());
        registry.add(StubDevice::new("B", true, &bus)).unwrap();

        let mut rx = bus.subscribe();
        let scheduler =
            DeviceScheduler::new(Arc::clone(&registry), Arc::clone(&bus), Duration::from_millis(10));
        scheduler.tick().await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source, "B");
        assert_eq!(event.event_type, SystemEventType::Error);
    }

    #[tokio::test]
    async fn test_start_all_and_stop_all() {
        let bus = Arc::new(EventBus::new(16));
        let registry = Arc::new(DeviceRegistry::new());
        let device = StubDevice::new("A", false, &bus);
        registry.add(device.clone()).unwrap();

        let scheduler =
            DeviceScheduler::new(Arc::clone(&registry), bus, Duration::from_millis(10));
        scheduler.start_all();
        assert!(device.is_running());
        scheduler.stop_all();
        assert!(!device.is_running());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let bus = Arc::new(EventBus::new(16));
        let registry = Arc::new(DeviceRegistry::new());
        let device = StubDevice::new("A", false, &bus);
        registry.add(device.clone()).unwrap();

        let scheduler = Arc::new(DeviceScheduler::new(
            Arc::clone(&registry),
            bus,
            Duration::from_millis(5),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let runner = Arc::clone(&scheduler);
        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(device.updates.load(Ordering::Relaxed) >= 2);
        assert!(!device.is_running());
    }
}
