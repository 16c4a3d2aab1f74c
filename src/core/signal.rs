// Copyright (c) 2026 aquaplant contributors
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/aquaplant/aquaplant

//! Typed publish/subscribe channel for device-to-device observation links

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Signal::subscribe`]; pass it back to
/// [`Signal::unsubscribe`] to stop delivery.
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription(u64);

/// A synchronous, typed event channel.
///
/// Subscribers are plain callbacks invoked on the emitting thread, in
/// subscription order. `emit` snapshots the subscriber list before invoking
/// anything, so a callback may subscribe or unsubscribe (on this or any
/// other signal) without deadlocking; such changes take effect from the next
/// emit.
pub struct Signal<T> {
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<T> Signal<T> {
    /// Create an empty signal.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a callback and return its subscription handle.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, Arc::new(callback)));
        Subscription(id)
    }

    /// Remove a previously registered callback. Unknown handles are ignored.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.subscribers.lock().retain(|(id, _)| *id != subscription.0);
    }

    /// Deliver `value` to every current subscriber, synchronously.
    pub fn emit(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_emit() {
        let signal: Signal<f64> = Signal::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        signal.subscribe(move |v| sink.lock().push(*v));

        signal.emit(&1.5);
        signal.emit(&2.5);

        assert_eq!(*seen.lock(), vec![1.5, 2.5]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let signal: Signal<u32> = Signal::new();
        let count = Arc::new(AtomicU64::new(0));

        let sink = Arc::clone(&count);
        let sub = signal.subscribe(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        });

        signal.emit(&1);
        signal.unsubscribe(sub);
        signal.emit(&2);

        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_relink_delivers_exactly_once() {
        // Unsubscribe-then-resubscribe must not leave a duplicate callback.
        let signal: Signal<u32> = Signal::new();
        let count = Arc::new(AtomicU64::new(0));

        let sink = Arc::clone(&count);
        let first = signal.subscribe(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        });
        signal.unsubscribe(first);

        let sink = Arc::clone(&count);
        signal.subscribe(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        });

        signal.emit(&7);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(signal.subscriber_count(), 1);
    }
}
