// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Message position markers.
//!
//! A [`MsgRef`] pins a position in a channel's history by the message's
//! creation time and its identity. Ordering between positions uses the
//! timestamp only; identity is used for exact matches.
//!
//! Format: `{timestamp_ms}:{msg_id}`

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reference to a message by time and identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MsgRef {
    /// Message creation time in milliseconds since Unix epoch.
    pub timestamp_ms: i64,
    /// Server-assigned message id. Empty for [`MsgRef::MIN`].
    pub msg_id: String,
}

impl MsgRef {
    /// Position before every message ("nothing yet").
    pub const MIN: MsgRef = MsgRef {
        timestamp_ms: i64::MIN,
        msg_id: String::new(),
    };

    /// Creates a new reference.
    pub fn new(timestamp_ms: i64, msg_id: impl Into<String>) -> Self {
        MsgRef {
            timestamp_ms,
            msg_id: msg_id.into(),
        }
    }

    /// Creates a reference from a wall clock time.
    pub fn at(time: &DateTime<Utc>, msg_id: impl Into<String>) -> Self {
        MsgRef::new(time.timestamp_millis(), msg_id)
    }

    /// Returns true for the "nothing yet" sentinel.
    pub fn is_min(&self) -> bool {
        self.timestamp_ms == i64::MIN
    }

    /// Compares positions by timestamp, ignoring identity.
    pub fn position_cmp(&self, other: &MsgRef) -> Ordering {
        self.timestamp_ms.cmp(&other.timestamp_ms)
    }

    /// Returns true if this position is strictly after the other.
    pub fn is_after(&self, other: &MsgRef) -> bool {
        self.position_cmp(other) == Ordering::Greater
    }

    /// Returns true if this position is strictly before the other.
    pub fn is_before(&self, other: &MsgRef) -> bool {
        self.position_cmp(other) == Ordering::Less
    }

    /// Returns whichever position is later; `self` wins ties.
    pub fn later_of(self, other: MsgRef) -> MsgRef {
        if other.is_after(&self) {
            other
        } else {
            self
        }
    }
}

impl Default for MsgRef {
    fn default() -> Self {
        MsgRef::MIN
    }
}

impl fmt::Display for MsgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_min() {
            write!(f, "-inf:")
        } else {
            write!(f, "{}:{}", self.timestamp_ms, self.msg_id)
        }
    }
}

/// Resolves a timestamp to the exact message created at that time.
///
/// Returns `None` when the timestamp is not known locally.
pub trait MessageLocator {
    fn locate(&self, timestamp_ms: i64) -> Option<MsgRef>;
}

impl<F> MessageLocator for F
where
    F: Fn(i64) -> Option<MsgRef>,
{
    fn locate(&self, timestamp_ms: i64) -> Option<MsgRef> {
        self(timestamp_ms)
    }
}

/// In-memory locator over the messages a client has loaded.
#[derive(Debug, Clone, Default)]
pub struct MessageIndex {
    by_time: BTreeMap<i64, String>,
}

impl MessageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message. A later insert at the same timestamp replaces the id.
    pub fn insert(&mut self, timestamp_ms: i64, msg_id: impl Into<String>) {
        self.by_time.insert(timestamp_ms, msg_id.into());
    }

    pub fn len(&self) -> usize {
        self.by_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_time.is_empty()
    }
}

impl MessageLocator for MessageIndex {
    fn locate(&self, timestamp_ms: i64) -> Option<MsgRef> {
        self.by_time
            .get(&timestamp_ms)
            .map(|id| MsgRef::new(timestamp_ms, id.clone()))
    }
}

#[cfg(test)]
#[path = "msg_ref_tests.rs"]
mod tests;
