// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for rp-core operations.

use thiserror::Error;

/// All possible errors that can occur in rp-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("event is missing a 'type' field")]
    MissingEventType,

    #[error("malformed {kind} event: {source}")]
    MalformedEvent {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown event kind: '{0}'\n  hint: valid kinds are: health.check, message.read, message.delivered, notification.mark_unread, connection.changed, connection.recovered")]
    UnknownEventKind(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for rp-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
