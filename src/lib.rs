// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! AquaPlant - Simulated Water Treatment Plant Core
//!
//! A device runtime for a simulated water-treatment control network:
//! - Sensors for pH, pressure, temperature, turbidity and tank level,
//!   each replaying a looping CSV simulation feed
//! - Controllable actuators: intake pump, chlorine dosing pump and a
//!   chemical doser that reacts to pH excursions on its own
//! - A central scheduler polling every device on one fixed interval
//! - Typed per-device change signals plus one ordered system event bus
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     AquaPlant Core                        │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────────────────────────────────┐  │
//! │  │ Scheduler│──▶│            Device Registry           │  │
//! │  └──────────┘   │ pH  Pressure  Temp  Turbidity  Tank  │  │
//! │       tick      │ IntakePump  ChlorinePump  Doser      │  │
//! │                 └──────────────────────────────────────┘  │
//! │                      │ typed signals      │ events        │
//! │                      ▼                    ▼               │
//! │              ┌──────────────┐     ┌──────────────┐        │
//! │              │  Subscribers │     │  Event Bus   │        │
//! │              └──────────────┘     └──────────────┘        │
//! │                                                           │
//! │  CSV simulation feeds ──▶ SimFileSource (looping replay)  │
//! └───────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod config;
pub mod core;
pub mod devices;
pub mod error;

// Re-exports for convenience
pub use config::Config;
pub use core::{DeviceRegistry, DeviceScheduler, EventBus, Signal, SystemEvent, SystemEventType};
pub use devices::{
    ChemicalDoser, ChlorinePump, Controllable, Device, DeviceStatus, IntakePump, PhSensor,
    PressureSensor, StorageSensor, TempSensor, TurbiditySensor,
};
pub use error::{DeviceError, Result};

/// AquaPlant version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// AquaPlant name
pub const NAME: &str = "AquaPlant";
