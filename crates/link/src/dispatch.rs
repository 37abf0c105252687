// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fan-out of realtime messages, keyed by their `event` field.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;

/// Listener callback. Identity is the `Arc` allocation.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registry of listeners per event name.
///
/// A handler is registered at most once per event name, and an event name
/// with no listeners left has no entry. The registry outlives reconnects.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Mutex<HashMap<String, Vec<Handler>>>,
}

impl EventDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `handler` for `event`. Registering the same handler twice for
    /// one event keeps a single entry.
    pub fn subscribe(self: &Arc<Self>, event: impl Into<String>, handler: Handler) -> Subscription {
        let event = event.into();
        {
            let mut listeners = self.listeners.lock();
            let set = listeners.entry(event.clone()).or_default();
            if !set.iter().any(|h| Arc::ptr_eq(h, &handler)) {
                set.push(Arc::clone(&handler));
            }
        }
        Subscription { registry: Arc::downgrade(self), event, handler }
    }

    /// Register a closure for `event`.
    pub fn on(
        self: &Arc<Self>,
        event: impl Into<String>,
        f: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe(event, Arc::new(f))
    }

    /// Invoke every handler registered for the message's `event`.
    ///
    /// Messages without a string `event` field are dropped. Handlers run
    /// synchronously, outside the registry lock. Returns how many ran.
    pub fn dispatch(&self, msg: &Value) -> usize {
        let Some(event) = event_name(msg) else {
            return 0;
        };
        let handlers: Vec<Handler> = match self.listeners.lock().get(event) {
            Some(set) => set.clone(),
            None => return 0,
        };
        for handler in &handlers {
            handler(msg);
        }
        handlers.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    /// Event names with at least one listener.
    pub fn events(&self) -> Vec<String> {
        self.listeners.lock().keys().cloned().collect()
    }

    fn remove(&self, event: &str, handler: &Handler) {
        let mut listeners = self.listeners.lock();
        if let Some(set) = listeners.get_mut(event) {
            set.retain(|h| !Arc::ptr_eq(h, handler));
            if set.is_empty() {
                listeners.remove(event);
            }
        }
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
///
/// Dropping it leaves the listener registered; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    registry: Weak<EventDispatcher>,
    event: String,
    handler: Handler,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove exactly this handler from this event.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event, &self.handler);
        }
    }
}

/// The `event` field of a realtime message.
pub fn event_name(msg: &Value) -> Option<&str> {
    msg.get("event").and_then(Value::as_str)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
