// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rp-client: realtime connection client for ripple
//!
//! Keeps one authenticated WebSocket per client instance alive: handshake,
//! heartbeats, staleness detection, jittered reconnects, token refresh and
//! reachability handling. Server events are decoded with `rp-core` and
//! published on the manager's [`rp_core::EventDispatcher`].

pub mod auth;
pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod reachability;
pub mod recovery;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use auth::{AuthError, AuthProvider, RefreshingToken, StaticToken};
pub use backoff::{JitteredBackoff, RetryPolicy};
pub use config::ClientConfig;
pub use connection::{ConnectionBuilder, ConnectionManager, ConnectionState, ReconnectOptions};
pub use error::{ConfigError, ConnectError, RecoveryError, RetryPolicyError};
pub use frame::Handshake;
pub use reachability::{
    ManualReachability, Reachability, ReachabilitySource, ReachabilitySubscription,
};
pub use recovery::{NoRecovery, RecoveryHandler};
pub use transport::{Transport, TransportError, WebSocketTransport};
