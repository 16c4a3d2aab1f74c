// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Device registry - the authoritative list of devices in the plant

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::devices::Device;
use crate::error::{DeviceError, Result};

/// Registry of every device in the plant core.
///
/// Names are the identity: lookup and duplicate detection ignore ASCII case,
/// so "Main Intake Pump" and "main intake pump" are the same device.
/// `all()` hands out a cloned snapshot, which means iterating callers (the
/// scheduler in particular) never hold the registry lock across awaits.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<Arc<dyn Device>>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Fails with [`DeviceError::AlreadyExists`] if a device
    /// with the same name (case-insensitive) is registered; the registry is
    /// unchanged.
    pub fn add(&self, device: Arc<dyn Device>) -> Result<()> {
        let mut devices = self.devices.write();
        if devices
            .iter()
            .any(|d| d.name().eq_ignore_ascii_case(device.name()))
        {
            return Err(DeviceError::AlreadyExists(device.name().to_string()));
        }
        debug!("registered device: {}", device.name());
        devices.push(device);
        Ok(())
    }

    /// Remove a device by name. Removing an absent name is a no-op.
    pub fn remove(&self, name: &str) {
        let mut devices = self.devices.write();
        devices.retain(|d| !d.name().eq_ignore_ascii_case(name));
    }

    /// Look up a device by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Device>> {
        self.devices
            .read()
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Snapshot of every registered device, in registration order.
    pub fn all(&self) -> Vec<Arc<dyn Device>> {
        self.devices.read().clone()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}
