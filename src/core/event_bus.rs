// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Event bus for detector notifications
//!
//! Explicit publish/subscribe registry: each event type maps to an ordered
//! list of callbacks. Dispatch is synchronous on the emitting task, in
//! insertion order, and a panicking listener does not stop the others.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::detection::{DetectionFailure, DeviceStatus};
use crate::telemetry::PerformanceReport;

/// Event types in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    StatusChanged,
    Error,
    PerformanceMetrics,
}

impl EventType {
    pub const ALL: [EventType; 3] = [
        EventType::StatusChanged,
        EventType::Error,
        EventType::PerformanceMetrics,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventType::StatusChanged => "statusChanged",
            EventType::Error => "error",
            EventType::PerformanceMetrics => "performanceMetrics",
        }
    }
}

/// Payload delivered to listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum DetectorEvent {
    StatusChanged(DeviceStatus),
    Error(DetectionFailure),
    PerformanceMetrics(PerformanceReport),
}

impl DetectorEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            DetectorEvent::StatusChanged(_) => EventType::StatusChanged,
            DetectorEvent::Error(_) => EventType::Error,
            DetectorEvent::PerformanceMetrics(_) => EventType::PerformanceMetrics,
        }
    }
}

pub type EventCallback = Arc<dyn Fn(&DetectorEvent) + Send + Sync + 'static>;

/// Wrap a closure as an [`EventCallback`]
pub fn listener<F>(f: F) -> EventCallback
where
    F: Fn(&DetectorEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Listener {
    id: u64,
    callback: EventCallback,
}

#[derive(Default)]
struct Registry {
    listeners: Mutex<HashMap<EventType, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, event_type: EventType, id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        match listeners.get_mut(&event_type) {
            Some(list) => {
                let before = list.len();
                list.retain(|l| l.id != id);
                before != list.len()
            }
            None => false,
        }
    }
}

/// Handle returned by [`EventBus::add_listener`]
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::remove`] to detach. Removing twice is a no-op.
pub struct Subscription {
    registry: Weak<Registry>,
    event_type: EventType,
    id: u64,
}

impl Subscription {
    pub fn remove(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.event_type, self.id),
            None => false,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("id", &self.id)
            .finish()
    }
}

/// Central event bus for pub/sub communication
#[derive(Default)]
pub struct EventBus {
    registry: Arc<Registry>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, event_type: EventType, callback: EventCallback) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .lock()
            .entry(event_type)
            .or_default()
            .push(Listener { id, callback });

        Subscription {
            registry: Arc::downgrade(&self.registry),
            event_type,
            id,
        }
    }

    /// Clear listeners for one event type, or all of them with `None`
    pub fn remove_all_listeners(&self, event_type: Option<EventType>) {
        let mut listeners = self.registry.listeners.lock();
        match event_type {
            Some(t) => {
                listeners.remove(&t);
            }
            None => listeners.clear(),
        }
    }

    pub fn listener_count(&self, event_type: EventType) -> usize {
        self.registry
            .listeners
            .lock()
            .get(&event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Deliver to every listener of the event's type; returns how many ran cleanly
    pub fn emit(&self, event: DetectorEvent) -> usize {
        let event_type = event.event_type();
        // Snapshot so listeners may add or remove listeners while being called
        let callbacks: Vec<EventCallback> = self
            .registry
            .listeners
            .lock()
            .get(&event_type)
            .map(|list| list.iter().map(|l| Arc::clone(&l.callback)).collect())
            .unwrap_or_default();

        let seq = self.event_counter.fetch_add(1, Ordering::Relaxed);
        trace!(seq, event = event_type.name(), listeners = callbacks.len(), "emit");

        let mut delivered = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("Listener for '{}' panicked", event_type.name()),
            }
        }
        delivered
    }

    pub fn emitted_count(&self) -> u64 {
        self.event_counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DeviceType;

    fn status_event() -> DetectorEvent {
        DetectorEvent::StatusChanged(DeviceStatus::new(true, DeviceType::Wired, "Headphones", 0.9))
    }

    #[test]
    fn test_insertion_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            bus.add_listener(EventType::StatusChanged, listener(move |_| order.lock().push(i)));
        }

        assert_eq!(bus.emit(status_event()), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_only_matching_type_is_notified() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        bus.add_listener(EventType::Error, listener(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(bus.emit(status_event()), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let bus = EventBus::new();
        let sub = bus.add_listener(EventType::StatusChanged, listener(|_| {}));
        assert_eq!(bus.listener_count(EventType::StatusChanged), 1);

        assert!(sub.remove());
        assert!(!sub.remove());
        assert_eq!(bus.listener_count(EventType::StatusChanged), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicU64::new(0));

        bus.add_listener(EventType::StatusChanged, listener(|_| panic!("listener failure")));
        let r = Arc::clone(&reached);
        bus.add_listener(EventType::StatusChanged, listener(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(bus.emit(status_event()), 1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_all_listeners() {
        let bus = EventBus::new();
        bus.add_listener(EventType::StatusChanged, listener(|_| {}));
        bus.add_listener(EventType::Error, listener(|_| {}));
        bus.add_listener(EventType::Error, listener(|_| {}));

        bus.remove_all_listeners(Some(EventType::Error));
        assert_eq!(bus.listener_count(EventType::Error), 0);
        assert_eq!(bus.listener_count(EventType::StatusChanged), 1);

        bus.remove_all_listeners(None);
        for t in EventType::ALL {
            assert_eq!(bus.listener_count(t), 0);
        }
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let s = Arc::clone(&slot);
        let sub = bus.add_listener(EventType::StatusChanged, listener(move |_| {
            if let Some(sub) = s.lock().as_ref() {
                sub.remove();
            }
        }));
        *slot.lock() = Some(sub);

        bus.emit(status_event());
        assert_eq!(bus.listener_count(EventType::StatusChanged), 0);
    }
}
