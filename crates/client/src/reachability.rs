// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network reachability signals.
//!
//! Platforms differ in how they report connectivity, so the connection
//! manager only depends on the [`ReachabilitySource`] trait. Going offline
//! marks the connection unhealthy; coming back online triggers a prompt
//! reconnect.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Whether the host currently has network access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Online,
    Offline,
}

pub type ReachabilityHandler = Arc<dyn Fn(Reachability) + Send + Sync>;

/// Something that reports reachability changes.
pub trait ReachabilitySource: Send + Sync {
    /// Register a handler. It stays registered until the returned
    /// subscription is dropped.
    fn on_reachability_change(&self, handler: ReachabilityHandler) -> ReachabilitySubscription;
}

/// Handle to a reachability handler. Dropping it detaches the handler.
#[must_use = "dropping a ReachabilitySubscription immediately detaches the handler"]
pub struct ReachabilitySubscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ReachabilitySubscription {
    /// Subscription that runs `detach` when dropped.
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        ReachabilitySubscription {
            detach: Some(Box::new(detach)),
        }
    }
}

impl Drop for ReachabilitySubscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for ReachabilitySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReachabilitySubscription").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Handlers {
    next_id: u64,
    entries: Vec<(u64, ReachabilityHandler)>,
}

/// A reachability source driven by the application, e.g. from an OS
/// connectivity callback.
#[derive(Clone, Default)]
pub struct ManualReachability {
    handlers: Arc<Mutex<Handlers>>,
}

impl ManualReachability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a change to every registered handler.
    pub fn set(&self, reachability: Reachability) {
        let handlers: Vec<ReachabilityHandler> = lock(&self.handlers)
            .entries
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        tracing::debug!("reachability changed to {:?}", reachability);
        for handler in handlers {
            handler(reachability);
        }
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.handlers).entries.len()
    }
}

impl ReachabilitySource for ManualReachability {
    fn on_reachability_change(&self, handler: ReachabilityHandler) -> ReachabilitySubscription {
        let id = {
            let mut handlers = lock(&self.handlers);
            handlers.next_id += 1;
            let id = handlers.next_id;
            handlers.entries.push((id, handler));
            id
        };
        let weak = Arc::downgrade(&self.handlers);
        ReachabilitySubscription::new(move || {
            if let Some(handlers) = weak.upgrade() {
                lock(&handlers).entries.retain(|(entry, _)| *entry != id);
            }
        })
    }
}

impl fmt::Debug for ManualReachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualReachability")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

fn lock(handlers: &Mutex<Handlers>) -> MutexGuard<'_, Handlers> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "reachability_tests.rs"]
mod tests;
