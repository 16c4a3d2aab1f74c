// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! System event bus - one ordered stream for everything notable in the plant

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Classification of a system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemEventType {
    /// General informational message.
    Info,
    /// A sensor reading or setpoint changed.
    DataUpdate,
    /// A device changed operational state.
    StateChange,
    /// A reading left its safe band.
    Warning,
    /// An edge-triggered alert fired.
    Alert,
    /// A device or subsystem failed.
    Error,
    /// A state change caused by an operator request.
    UserAction,
    /// A state change caused by the plant's own control logic.
    AutomaticAction,
}

/// One notable occurrence anywhere in the plant core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    /// Monotonic sequence number assigned by the bus.
    pub id: u64,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// Device or subsystem that produced it.
    pub source: String,
    /// Human-readable description.
    pub message: String,
    /// Event classification.
    pub event_type: SystemEventType,
}

/// Central event bus for pub/sub communication.
///
/// Every event is broadcast on a single ordered channel and mirrored as one
/// tracing line, so the text log and the subscription stream always agree.
/// External consumers subscribe here instead of wiring up each device; they
/// own marshaling events off the ticking thread.
pub struct EventBus {
    event_tx: broadcast::Sender<SystemEvent>,
    event_counter: AtomicU64,
}

impl EventBus {
    /// Create a bus whose subscribers lag at most `capacity` events behind.
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self {
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    /// Wrap, log and broadcast one event. Publishing never fails; with no
    /// subscribers the event still reaches the text log.
    pub fn publish(
        &self,
        source: &str,
        event_type: SystemEventType,
        message: impl Into<String>,
    ) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = SystemEvent {
            id,
            timestamp: Utc::now(),
            source: source.to_string(),
            message: message.into(),
            event_type,
        };

        match event.event_type {
            SystemEventType::Error => error!("[{}] {}", event.source, event.message),
            SystemEventType::Warning | SystemEventType::Alert => {
                warn!("[{}] {}", event.source, event.message)
            }
            _ => info!("[{}] {}", event.source, event.message),
        }

        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the aggregate event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish("pH Sensor", SystemEventType::DataUpdate, "pH reading changed: 7.20");

        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("bus closed");

        assert_eq!(event.source, "pH Sensor");
        assert_eq!(event.event_type, SystemEventType::DataUpdate);
        assert_eq!(event.message, "pH reading changed: 7.20");
    }

    #[tokio::test]
    async fn test_event_ids_are_ordered() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish("a", SystemEventType::Info, "first");
        bus.publish("b", SystemEventType::Info, "second");
        bus.publish("c", SystemEventType::Info, "third");

        let mut last = None;
        for _ in 0..3 {
            let event = rx.recv().await.expect("bus closed");
            if let Some(prev) = last {
                assert!(event.id > prev);
            }
            last = Some(event.id);
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new(4);
        bus.publish("scheduler", SystemEventType::Info, "no one is listening");
    }
}
