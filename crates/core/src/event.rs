// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Events delivered over the real-time connection.
//!
//! Inbound frames are JSON objects keyed by a `type` field. The kinds the
//! client acts on are decoded into typed payloads; everything else is kept
//! as raw JSON under [`Event::Other`]. Connection lifecycle events
//! (`connection.changed`, `connection.recovered`) are produced locally.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A user as referenced by events and read-state snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Any additional profile fields the server sends along.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        User {
            id: id.into(),
            details: Map::new(),
        }
    }
}

/// Server liveness event; also the handshake acknowledgement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub me: Option<Value>,
}

/// A user has read up to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReadEvent {
    pub user: User,
    #[serde(rename = "created_at")]
    pub read_at: DateTime<Utc>,
    #[serde(default)]
    pub last_read_message_id: Option<String>,
}

/// Messages up to a point have reached a user's device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeliveredEvent {
    pub user: User,
    #[serde(rename = "last_delivered_at")]
    pub delivered_at: DateTime<Utc>,
    #[serde(default)]
    pub last_delivered_message_id: Option<String>,
}

/// A user marked part of the channel as unread again.
///
/// Without `last_read_at` the whole channel is unread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkUnreadEvent {
    pub user: User,
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_read_message_id: Option<String>,
}

/// One row of a server-provided read-state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub user: User,
    pub last_read: DateTime<Utc>,
    #[serde(default)]
    pub last_delivered_at: Option<DateTime<Utc>>,
}

/// Kinds of events that listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    HealthCheck,
    MessageRead,
    MessageDelivered,
    NotificationMarkUnread,
    ConnectionChanged,
    ConnectionRecovered,
    Other,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::HealthCheck => "health.check",
            EventKind::MessageRead => "message.read",
            EventKind::MessageDelivered => "message.delivered",
            EventKind::NotificationMarkUnread => "notification.mark_unread",
            EventKind::ConnectionChanged => "connection.changed",
            EventKind::ConnectionRecovered => "connection.recovered",
            EventKind::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "health.check" => Ok(EventKind::HealthCheck),
            "message.read" => Ok(EventKind::MessageRead),
            "message.delivered" => Ok(EventKind::MessageDelivered),
            "notification.mark_unread" => Ok(EventKind::NotificationMarkUnread),
            "connection.changed" => Ok(EventKind::ConnectionChanged),
            "connection.recovered" => Ok(EventKind::ConnectionRecovered),
            _ => Err(Error::UnknownEventKind(s.to_string())),
        }
    }
}

/// An event published on a client's dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    HealthCheck(HealthCheck),
    MessageRead(MessageReadEvent),
    MessageDelivered(MessageDeliveredEvent),
    NotificationMarkUnread(MarkUnreadEvent),
    /// Connection health flipped. Produced locally.
    ConnectionChanged { online: bool },
    /// A reconnect finished and the recovery callback ran. Produced locally.
    ConnectionRecovered,
    /// Any event the client does not interpret.
    Other { kind: String, payload: Value },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::HealthCheck(_) => EventKind::HealthCheck,
            Event::MessageRead(_) => EventKind::MessageRead,
            Event::MessageDelivered(_) => EventKind::MessageDelivered,
            Event::NotificationMarkUnread(_) => EventKind::NotificationMarkUnread,
            Event::ConnectionChanged { .. } => EventKind::ConnectionChanged,
            Event::ConnectionRecovered => EventKind::ConnectionRecovered,
            Event::Other { .. } => EventKind::Other,
        }
    }

    /// Decodes an event from a raw inbound frame.
    pub fn from_json(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_value(value)
    }

    /// Decodes an event from an already-parsed JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(Error::MissingEventType)?
            .to_string();

        match kind.as_str() {
            "health.check" => Ok(Event::HealthCheck(decode(&kind, value)?)),
            "message.read" => Ok(Event::MessageRead(decode(&kind, value)?)),
            "message.delivered" => Ok(Event::MessageDelivered(decode(&kind, value)?)),
            "notification.mark_unread" => Ok(Event::NotificationMarkUnread(decode(&kind, value)?)),
            _ => Ok(Event::Other {
                kind,
                payload: value,
            }),
        }
    }

    /// Creates a connection.changed event.
    pub fn connection_changed(online: bool) -> Self {
        Event::ConnectionChanged { online }
    }
}

fn decode<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| Error::MalformedEvent {
        kind: kind.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
