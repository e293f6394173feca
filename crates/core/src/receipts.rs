// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user read and delivery progress.
//!
//! The tracker keeps, for every user it has heard about, the last message
//! they read and the last message delivered to them. Positions only move
//! forward, with one exception: a mark-unread notification may move the read
//! position backward.
//!
//! Invariant (after ingest, read and delivered updates):
//!
//! ```text
//! last_delivered_ref.timestamp_ms >= last_read_ref.timestamp_ms
//! ```
//!
//! Two ordered indexes (by read position and by delivered position) answer
//! "who is at or past this message" without scanning every user. Within one
//! timestamp, users are ordered by when they reached it.

use std::collections::{BTreeMap, HashMap};

use crate::event::{
    Event, MarkUnreadEvent, MessageDeliveredEvent, MessageReadEvent, ReadResponse, User,
};
use crate::msg_ref::{MessageLocator, MsgRef};

/// A user's read and delivery positions.
///
/// Values are never edited in place; every change produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProgress {
    pub user: User,
    pub last_read_ref: MsgRef,
    pub last_delivered_ref: MsgRef,
}

impl UserProgress {
    fn new(user: User) -> Self {
        UserProgress {
            user,
            last_read_ref: MsgRef::MIN,
            last_delivered_ref: MsgRef::MIN,
        }
    }

    /// Advances read, pulling delivered along if it is behind.
    fn with_read(&self, read: MsgRef) -> Self {
        let delivered = self.last_delivered_ref.clone().later_of(read.clone());
        UserProgress {
            user: self.user.clone(),
            last_read_ref: read,
            last_delivered_ref: delivered,
        }
    }

    fn with_delivered(&self, delivered: MsgRef) -> Self {
        UserProgress {
            user: self.user.clone(),
            last_read_ref: self.last_read_ref.clone(),
            last_delivered_ref: delivered,
        }
    }

}

/// `(timestamp_ms, arrival sequence)`
type OrderKey = (i64, u64);

/// Users ordered by one of their positions.
#[derive(Debug, Default)]
struct PositionIndex {
    order: BTreeMap<OrderKey, String>,
    keys: HashMap<String, OrderKey>,
}

impl PositionIndex {
    fn place(&mut self, user_id: &str, key: OrderKey) {
        if let Some(old) = self.keys.insert(user_id.to_string(), key) {
            self.order.remove(&old);
        }
        self.order.insert(key, user_id.to_string());
    }

    /// Users whose position is at or after `timestamp_ms`.
    fn at_least(&self, timestamp_ms: i64) -> impl Iterator<Item = &str> {
        self.order
            .range((timestamp_ms, 0)..)
            .map(|(_, id)| id.as_str())
    }

    /// Users whose position is exactly `timestamp_ms`.
    fn exactly(&self, timestamp_ms: i64) -> impl Iterator<Item = &str> {
        self.order
            .range((timestamp_ms, 0)..=(timestamp_ms, u64::MAX))
            .map(|(_, id)| id.as_str())
    }

    fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.keys.clear();
    }
}

/// Which position a query looks at.
#[derive(Debug, Clone, Copy)]
enum Pointer {
    Read,
    Delivered,
}

impl Pointer {
    fn of(self, progress: &UserProgress) -> &MsgRef {
        match self {
            Pointer::Read => &progress.last_read_ref,
            Pointer::Delivered => &progress.last_delivered_ref,
        }
    }
}

/// Tracks read and delivery receipts for one channel.
pub struct ReceiptTracker<L> {
    locator: L,
    by_user: HashMap<String, UserProgress>,
    by_read: PositionIndex,
    by_delivered: PositionIndex,
    /// Arrival counter used to order users sharing a timestamp.
    seq: u64,
}

impl<L: MessageLocator> ReceiptTracker<L> {
    pub fn new(locator: L) -> Self {
        ReceiptTracker {
            locator,
            by_user: HashMap::new(),
            by_read: PositionIndex::default(),
            by_delivered: PositionIndex::default(),
            seq: 0,
        }
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Mutable access to the locator, e.g. to record newly loaded messages.
    pub fn locator_mut(&mut self) -> &mut L {
        &mut self.locator
    }

    /// Forgets every user.
    pub fn reset(&mut self) {
        self.by_user.clear();
        self.by_read.clear();
        self.by_delivered.clear();
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    pub fn get_user_progress(&self, user_id: &str) -> Option<&UserProgress> {
        self.by_user.get(user_id)
    }

    /// Replaces all progress with a server read-state snapshot.
    ///
    /// Timestamps the locator does not know collapse to [`MsgRef::MIN`].
    pub fn ingest_initial(&mut self, snapshot: &[ReadResponse]) {
        self.reset();
        for row in snapshot {
            let read = self
                .locator
                .locate(row.last_read.timestamp_millis())
                .unwrap_or(MsgRef::MIN);
            let delivered = row
                .last_delivered_at
                .and_then(|at| self.locator.locate(at.timestamp_millis()))
                .unwrap_or(MsgRef::MIN)
                .later_of(read.clone());

            self.store(UserProgress {
                user: row.user.clone(),
                last_read_ref: read,
                last_delivered_ref: delivered,
            });
        }
        tracing::debug!("ingested read state for {} users", self.by_user.len());
    }

    /// Applies a `message.read` event. Returns true if progress changed.
    pub fn on_message_read(&mut self, event: &MessageReadEvent) -> bool {
        let Some(target) = self.resolve(&event.read_at, event.last_read_message_id.as_deref())
        else {
            tracing::debug!("dropping read for {}: message not found", event.user.id);
            return false;
        };

        let current = self.progress_or_new(&event.user);
        if !target.is_after(&current.last_read_ref) {
            return false;
        }
        self.store(current.with_read(target));
        true
    }

    /// Applies a `message.delivered` event. Returns true if progress changed.
    ///
    /// Delivery never moves behind the read position and never moves back.
    pub fn on_message_delivered(&mut self, event: &MessageDeliveredEvent) -> bool {
        let Some(target) = self.resolve(
            &event.delivered_at,
            event.last_delivered_message_id.as_deref(),
        ) else {
            tracing::debug!("dropping delivery for {}: message not found", event.user.id);
            return false;
        };

        let current = self.progress_or_new(&event.user);
        let target = target.later_of(current.last_read_ref.clone());
        if !target.is_after(&current.last_delivered_ref) {
            return false;
        }
        self.store(current.with_delivered(target));
        true
    }

    /// Applies a `notification.mark_unread` event. Returns true if progress changed.
    ///
    /// This is the only update that may move the read position backward.
    /// A forward move raises delivered along with it, as a read would.
    pub fn on_notification_mark_unread(&mut self, event: &MarkUnreadEvent) -> bool {
        let target = match &event.last_read_at {
            None => MsgRef::MIN,
            Some(at) => match self.resolve(at, event.last_read_message_id.as_deref()) {
                Some(target) => target,
                None => {
                    tracing::debug!("dropping mark-unread for {}: message not found", event.user.id);
                    return false;
                }
            },
        };

        let current = self.progress_or_new(&event.user);
        if target == current.last_read_ref {
            return false;
        }
        self.store(current.with_read(target));
        true
    }

    /// Routes a dispatched event to the matching update.
    ///
    /// Returns true if the event changed any progress.
    pub fn handle_event(&mut self, event: &Event) -> bool {
        match event {
            Event::MessageRead(e) => self.on_message_read(e),
            Event::MessageDelivered(e) => self.on_message_delivered(e),
            Event::NotificationMarkUnread(e) => self.on_notification_mark_unread(e),
            _ => false,
        }
    }

    /// Users who have read `msg` or anything after it.
    pub fn readers_for_message(&self, msg: &MsgRef) -> Vec<&User> {
        self.users(self.by_read.at_least(msg.timestamp_ms))
    }

    /// Users who have received `msg` or anything after it.
    pub fn delivered_for_message(&self, msg: &MsgRef) -> Vec<&User> {
        self.users(self.by_delivered.at_least(msg.timestamp_ms))
    }

    /// Users who have received `msg` but not yet read it.
    pub fn delivered_not_read_for_message(&self, msg: &MsgRef) -> Vec<&User> {
        self.by_delivered
            .at_least(msg.timestamp_ms)
            .filter_map(|id| self.by_user.get(id))
            .filter(|p| p.last_read_ref.is_before(msg))
            .map(|p| &p.user)
            .collect()
    }

    pub fn has_user_read(&self, msg: &MsgRef, user_id: &str) -> bool {
        self.by_user
            .get(user_id)
            .is_some_and(|p| !p.last_read_ref.is_before(msg))
    }

    pub fn has_user_delivered(&self, msg: &MsgRef, user_id: &str) -> bool {
        self.by_user
            .get(user_id)
            .is_some_and(|p| !p.last_delivered_ref.is_before(msg))
    }

    /// Users whose read pointer is exactly `msg` (timestamp and id).
    pub fn users_whose_last_read_is(&self, msg: &MsgRef) -> Vec<&User> {
        self.exact(&self.by_read, Pointer::Read, msg)
    }

    /// Users whose delivered pointer is exactly `msg` (timestamp and id).
    pub fn users_whose_last_delivered_is(&self, msg: &MsgRef) -> Vec<&User> {
        self.exact(&self.by_delivered, Pointer::Delivered, msg)
    }

    /// Partitions users by the message id of their read pointer.
    ///
    /// Users who have read nothing are left out.
    pub fn group_users_by_last_read_message(&self) -> HashMap<String, Vec<&User>> {
        self.group(&self.by_read, Pointer::Read)
    }

    /// Partitions users by the message id of their delivered pointer.
    pub fn group_users_by_last_delivered_message(&self) -> HashMap<String, Vec<&User>> {
        self.group(&self.by_delivered, Pointer::Delivered)
    }

    fn resolve(
        &self,
        at: &chrono::DateTime<chrono::Utc>,
        known_id: Option<&str>,
    ) -> Option<MsgRef> {
        let timestamp_ms = at.timestamp_millis();
        match known_id {
            Some(id) => Some(MsgRef::new(timestamp_ms, id)),
            None => self.locator.locate(timestamp_ms),
        }
    }

    fn progress_or_new(&self, user: &User) -> UserProgress {
        self.by_user
            .get(&user.id)
            .cloned()
            .unwrap_or_else(|| UserProgress::new(user.clone()))
    }

    /// Replaces a user's progress and re-slots them in whichever index moved.
    fn store(&mut self, progress: UserProgress) {
        let id = progress.user.id.clone();
        let previous = self.by_user.get(&id);
        let read_moved = previous.map_or(true, |p| p.last_read_ref != progress.last_read_ref);
        let delivered_moved =
            previous.map_or(true, |p| p.last_delivered_ref != progress.last_delivered_ref);

        if read_moved {
            self.seq += 1;
            self.by_read
                .place(&id, (progress.last_read_ref.timestamp_ms, self.seq));
        }
        if delivered_moved {
            self.seq += 1;
            self.by_delivered
                .place(&id, (progress.last_delivered_ref.timestamp_ms, self.seq));
        }
        self.by_user.insert(id, progress);
    }

    fn users<'a>(&'a self, ids: impl Iterator<Item = &'a str>) -> Vec<&'a User> {
        ids.filter_map(|id| self.by_user.get(id))
            .map(|p| &p.user)
            .collect()
    }

    fn exact(&self, index: &PositionIndex, pointer: Pointer, msg: &MsgRef) -> Vec<&User> {
        if msg.msg_id.is_empty() {
            return Vec::new();
        }
        index
            .exactly(msg.timestamp_ms)
            .filter_map(|id| self.by_user.get(id))
            .filter(|p| pointer.of(p).msg_id == msg.msg_id)
            .map(|p| &p.user)
            .collect()
    }

    fn group(&self, index: &PositionIndex, pointer: Pointer) -> HashMap<String, Vec<&User>> {
        let mut groups: HashMap<String, Vec<&User>> = HashMap::new();
        for progress in index.iter().filter_map(|id| self.by_user.get(id)) {
            let at = pointer.of(progress);
            if at.msg_id.is_empty() {
                continue;
            }
            groups.entry(at.msg_id.clone()).or_default().push(&progress.user);
        }
        groups
    }
}

impl<L> std::fmt::Debug for ReceiptTracker<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiptTracker")
            .field("users", &self.by_user.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "receipts_tests.rs"]
mod tests;
