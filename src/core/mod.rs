// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Core plant infrastructure: event bus, typed signals, device registry and
//! the polling scheduler.

mod event_bus;
mod registry;
mod scheduler;
mod signal;

pub use event_bus::{EventBus, SystemEvent, SystemEventType};
pub use registry::DeviceRegistry;
pub use scheduler::DeviceScheduler;
pub use signal::{Signal, Subscription};
