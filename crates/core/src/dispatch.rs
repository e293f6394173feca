// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed publish/subscribe for client events.
//!
//! Each client owns its own [`EventDispatcher`]; there is no global listener
//! table, so independent clients never see each other's events.
//!
//! Subscribing returns a [`Subscription`] handle. Dropping the handle (or
//! calling [`Subscription::unsubscribe`]) removes the listener. Handlers run
//! synchronously on the dispatching task, in subscription order, and may
//! subscribe or unsubscribe from inside a callback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::event::{Event, EventKind};

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Listener {
    id: u64,
    /// `None` listens to every kind.
    kind: Option<EventKind>,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Event fan-out owned by a single client instance.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listens to one kind of event.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(Some(kind), Arc::new(handler))
    }

    /// Listens to every event.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(handler))
    }

    /// Delivers an event to every matching listener.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &Event) -> usize {
        let kind = event.kind();
        // Snapshot so handlers can (un)subscribe without deadlocking.
        let handlers: Vec<Handler> = lock(&self.registry)
            .listeners
            .iter()
            .filter(|l| l.kind.map_or(true, |k| k == kind))
            .map(|l| Arc::clone(&l.handler))
            .collect();

        tracing::trace!("dispatching {} to {} listeners", kind, handlers.len());
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    fn add(&self, kind: Option<EventKind>, handler: Handler) -> Subscription {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push(Listener { id, kind, handler });
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately removes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Removes the listener now.
    pub fn unsubscribe(self) {}

    /// Keeps the listener registered for the dispatcher's whole lifetime.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }

    /// Returns true while the listener is still registered.
    pub fn is_active(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let active = lock(&registry).listeners.iter().any(|l| l.id == self.id);
        active
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.retain(|l| l.id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
