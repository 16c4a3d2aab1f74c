// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Error taxonomy for the device runtime

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by devices and the runtime around them.
///
/// Only `NotFound`, `OutOfRange` and `AlreadyExists` reach callers under
/// normal operation; `Parse` is recovered inside the sensor that hit it and
/// `Fault` is absorbed at the scheduler boundary.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Simulation file missing at device construction.
    #[error("simulation file not found: {0}")]
    NotFound(PathBuf),

    /// A setpoint was pushed outside its allowed bounds. Device state is
    /// unchanged when this is returned.
    #[error("{name} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        /// Setpoint name, e.g. "flow rate".
        name: &'static str,
        /// The rejected value.
        value: f64,
        /// Lower bound, inclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
    },

    /// A device with the same name (case-insensitive) is already registered.
    #[error("device '{0}' is already registered")]
    AlreadyExists(String),

    /// Malformed simulation record. Recovered locally; the tick is skipped.
    #[error("malformed simulation record: {0}")]
    Parse(String),

    /// Any other failure inside a device's update pass.
    #[error("device fault: {0}")]
    Fault(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DeviceError>;
