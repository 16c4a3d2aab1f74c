// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Device module - sensors, actuators and their simulation feeds

mod chlorine_pump;
mod doser;
mod intake_pump;
mod ph;
mod pressure;
mod sim_file;
mod storage;
mod temperature;
mod traits;
mod turbidity;

pub use chlorine_pump::ChlorinePump;
pub use doser::ChemicalDoser;
pub use intake_pump::IntakePump;
pub use ph::PhSensor;
pub use pressure::PressureSensor;
pub use sim_file::SimFileSource;
pub use storage::StorageSensor;
pub use temperature::TempSensor;
pub use traits::{Controllable, Device, DeviceCore, DeviceStatus, Telemetry};
pub use turbidity::TurbiditySensor;

/// Change-event suppression threshold for precision readings (pH, bar, NTU,
/// degrees, litres). Smaller movements are floating-point noise.
pub const READING_EPSILON: f64 = 0.01;

/// Change-event suppression threshold for percentage-like setpoints
/// (flow rate, dosing rate).
pub const SETPOINT_EPSILON: f64 = 0.1;
