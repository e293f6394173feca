// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the realtime client.

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::AuthError;
use crate::frame::TOKEN_EXPIRED_CODE;
use crate::transport::TransportError;

/// Why a connection attempt failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectError {
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("socket closed abnormally (code {code}): {reason}")]
    Closed { code: u16, reason: String },

    #[error("connection rejected by server: {reason}")]
    Rejected { reason: String },

    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("server error {code}: {message}")]
    Server {
        code: i64,
        message: String,
        status: Option<u16>,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connection was not healthy within {0:?}")]
    Timeout(Duration),

    #[error("connection attempt superseded by a newer one or a disconnect")]
    Superseded,
}

impl ConnectError {
    /// True for failures of the socket itself, which are worth retrying.
    ///
    /// Anything else (a server error frame, a rejection, a bad token
    /// provider) is permanent for the attempt that produced it.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            ConnectError::Transport(_)
                | ConnectError::Closed { .. }
                | ConnectError::HandshakeTimeout(_)
        )
    }

    /// True when the server refused the credential because it expired.
    pub fn is_token_expired(&self) -> bool {
        matches!(self, ConnectError::Server { code, .. } if *code == TOKEN_EXPIRED_CODE)
    }
}

/// A retry policy declined to produce an interval.
#[derive(Debug, Clone, thiserror::Error)]
#[error("retry policy failed: {0}")]
pub struct RetryPolicyError(pub String);

/// Post-reconnect recovery failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("recovery failed: {0}")]
pub struct RecoveryError(pub String);

/// Errors loading or validating a [`crate::ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
