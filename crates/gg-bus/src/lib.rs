// SPDX-License-Identifier: MIT OR Apache-2.0
#![warn(missing_docs)]
//! Synchronous in-process publish/subscribe event bus.
//!
//! Unlike a broadcast channel meant to fan out across tasks, [`EventBus`]
//! dispatches on the publisher's own thread, in subscriber registration
//! order, and isolates a panicking handler with `catch_unwind` so one bad
//! handler never blocks delivery to the rest — the same "fire all, collect
//! all outcomes" guarantee a lifecycle hook registry gives a runtime, here
//! applied to domain events instead of run lifecycle callbacks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// An event flowing through the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceEvent {
    /// Dotted event type (`"task.created"`, `"feedback.created"`, ...).
    #[serde(rename = "type")]
    pub event_type: String,
    /// RFC3339 timestamp of publication.
    pub timestamp: String,
    /// Name of the adapter or subsystem that published this event.
    pub source: String,
    /// Event-specific payload.
    pub payload: Value,
}

impl GovernanceEvent {
    /// Construct an event with the given type/source/payload and caller
    /// supplied timestamp (this crate never reads the clock).
    #[must_use]
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, payload: Value, timestamp: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            payload,
            timestamp: timestamp.into(),
        }
    }
}

/// A handler invoked for every event matching its subscription.
pub type Handler = Box<dyn Fn(&GovernanceEvent) + Send + Sync>;

/// Opaque handle returned by [`EventBus::subscribe`]; pass its `id` to
/// [`EventBus::unsubscribe`] to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    /// Unique subscription id.
    pub id: u64,
}

struct Entry {
    id: u64,
    event_type: String,
    handler: Handler,
}

/// Point-in-time counters mirroring the teacher's event-bus observability
/// habit. `dropped` counts handler panics, not "no subscriber" (there is
/// no such failure mode for a synchronous dispatch-to-whoever's-registered
/// bus).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventBusStats {
    /// Total events published.
    pub total_published: u64,
    /// Subscriptions currently registered.
    pub active_subscribers: usize,
    /// Handler invocations that panicked and were isolated.
    pub dropped: u64,
}

/// Synchronous, in-process, typed publish/subscribe bus.
pub struct EventBus {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
    total_published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    /// Create an empty bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            total_published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register `handler` for events whose type equals `event_type`, or
    /// for every event if `event_type == "*"`.
    pub fn subscribe(&self, event_type: impl Into<String>, handler: Handler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().expect("event bus mutex poisoned");
        entries.push(Entry {
            id,
            event_type: event_type.into(),
            handler,
        });
        Subscription { id }
    }

    /// Cancel a subscription. Does nothing if the id is unknown (already
    /// unsubscribed, or never existed).
    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut entries = self.entries.lock().expect("event bus mutex poisoned");
        entries.retain(|e| e.id != subscription.id);
    }

    /// Dispatch `event` synchronously to every matching subscriber in
    /// registration order. A handler that panics is caught and logged;
    /// it does not prevent delivery to subscribers registered after it.
    pub fn publish(&self, event: GovernanceEvent) {
        self.total_published.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.lock().expect("event bus mutex poisoned");
        for entry in entries.iter() {
            if entry.event_type != "*" && entry.event_type != event.event_type {
                continue;
            }
            debug!(subscription_id = entry.id, event_type = %event.event_type, "dispatching event");
            let handler = &entry.handler;
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if outcome.is_err() {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                error!(
                    subscription_id = entry.id,
                    event_type = %event.event_type,
                    "event handler panicked; isolated from other subscribers"
                );
            }
        }
    }

    /// Current point-in-time counters.
    #[must_use]
    pub fn stats(&self) -> EventBusStats {
        let entries = self.entries.lock().expect("event bus mutex poisoned");
        EventBusStats {
            total_published: self.total_published.load(Ordering::SeqCst),
            active_subscribers: entries.len(),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }

    /// Remove every subscription. Test teardown only (§5).
    pub fn clear_subscriptions(&self) {
        self.entries.lock().expect("event bus mutex poisoned").clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn event(event_type: &str) -> GovernanceEvent {
        GovernanceEvent::new(event_type, "test", json!({}), "2024-01-01T00:00:00Z")
    }

    #[test]
    fn handler_receives_matching_event() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe("task.created", Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        bus.publish(event("task.created"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_does_not_receive_non_matching_event() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe("task.created", Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        bus.publish(event("cycle.created"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wildcard_subscriber_receives_everything() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe("*", Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        bus.publish(event("task.created"));
        bus.publish(event("cycle.created"));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            bus.subscribe("task.created", Box::new(move |_| {
                order.lock().unwrap().push(n);
            }));
        }
        bus.publish(event("task.created"));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_handler_does_not_block_later_handlers() {
        let bus = EventBus::new();
        bus.subscribe("task.created", Box::new(|_| panic!("boom")));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        bus.subscribe("task.created", Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        bus.publish(event("task.created"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.stats().dropped, 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        let sub = bus.subscribe("task.created", Box::new(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        }));
        bus.unsubscribe(sub);
        bus.publish(event("task.created"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stats_track_publish_count_and_subscribers() {
        let bus = EventBus::new();
        bus.subscribe("task.created", Box::new(|_| {}));
        bus.subscribe("*", Box::new(|_| {}));
        bus.publish(event("task.created"));
        bus.publish(event("task.created"));
        let stats = bus.stats();
        assert_eq!(stats.total_published, 2);
        assert_eq!(stats.active_subscribers, 2);
    }

    #[test]
    fn clear_subscriptions_removes_all() {
        let bus = EventBus::new();
        bus.subscribe("task.created", Box::new(|_| {}));
        bus.subscribe("*", Box::new(|_| {}));
        bus.clear_subscriptions();
        assert_eq!(bus.stats().active_subscribers, 0);
    }
}
