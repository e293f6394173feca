// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Configuration is usually loaded from a TOML file:
//!
//! ```toml
//! base_url = "wss://chat.example.com"
//! api_key = "key"
//! user_id = "alice"
//! token = "eyJ..."
//!
//! [user_details]
//! name = "Alice"
//! ```
//!
//! Every timing knob has a default; only `base_url`, `api_key` and `user_id`
//! are required.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Connection settings for one client instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server base URL (`ws://` or `wss://`). `/connect` is appended.
    pub base_url: String,
    /// Application key sent with every connection.
    pub api_key: String,
    /// Id of the user this client connects as.
    pub user_id: String,
    /// Extra user fields forwarded to the server in the connect payload.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub user_details: Map<String, Value>,
    /// Static token. Omit for anonymous connections or when the caller
    /// supplies its own auth provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Client identification string sent with the connect request.
    #[serde(default = "default_client_name")]
    pub client_name: String,
    /// Heartbeat send interval in milliseconds (default: 30000).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Silence tolerated beyond one heartbeat interval before the
    /// connection is considered stale (default: 10000).
    #[serde(default = "default_heartbeat_slack_ms")]
    pub heartbeat_slack_ms: u64,
    /// How often staleness is checked in milliseconds (default: 1000).
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// Max time from socket open to handshake frame (default: 15000).
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Max time `connect()` waits for a healthy connection when the first
    /// attempt fails and retries take over (default: 15000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Max time `disconnect()` waits for the close acknowledgement (default: 1000).
    #[serde(default = "default_disconnect_timeout_ms")]
    pub disconnect_timeout_ms: u64,
    /// Ceiling for the jittered retry interval (default: 25000).
    #[serde(default = "default_max_retry_interval_ms")]
    pub max_retry_interval_ms: u64,
    /// Delay before an unhealthy transition is announced (default: 1000).
    #[serde(default = "default_offline_notice_delay_ms")]
    pub offline_notice_delay_ms: u64,
    /// Retry interval used when the network comes back online (default: 10).
    #[serde(default = "default_online_retry_interval_ms")]
    pub online_retry_interval_ms: u64,
}

fn default_client_name() -> String {
    format!("ripple-rust-v{}", env!("CARGO_PKG_VERSION"))
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_slack_ms() -> u64 {
    10_000
}

fn default_monitor_interval_ms() -> u64 {
    1_000
}

fn default_handshake_timeout_ms() -> u64 {
    15_000
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

fn default_disconnect_timeout_ms() -> u64 {
    1_000
}

fn default_max_retry_interval_ms() -> u64 {
    25_000
}

fn default_offline_notice_delay_ms() -> u64 {
    1_000
}

fn default_online_retry_interval_ms() -> u64 {
    10
}

impl ClientConfig {
    /// Config with every optional field at its default.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            api_key: api_key.into(),
            user_id: user_id.into(),
            user_details: Map::new(),
            token: None,
            client_name: default_client_name(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_slack_ms: default_heartbeat_slack_ms(),
            monitor_interval_ms: default_monitor_interval_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            disconnect_timeout_ms: default_disconnect_timeout_ms(),
            max_retry_interval_ms: default_max_retry_interval_ms(),
            offline_notice_delay_ms: default_offline_notice_delay_ms(),
            online_retry_interval_ms: default_online_retry_interval_ms(),
        }
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid(format!(
                "base_url must use ws:// or wss://, got '{}'",
                url.scheme()
            )));
        }
        if self.api_key.is_empty() {
            return Err(ConfigError::Invalid("api_key is empty".into()));
        }
        if self.user_id.is_empty() {
            return Err(ConfigError::Invalid("user_id is empty".into()));
        }
        if self.heartbeat_interval_ms == 0 || self.monitor_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_ms and monitor_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Silence after which the connection is treated as dead.
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms + self.heartbeat_slack_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    pub fn max_retry_interval(&self) -> Duration {
        Duration::from_millis(self.max_retry_interval_ms)
    }

    pub fn offline_notice_delay(&self) -> Duration {
        Duration::from_millis(self.offline_notice_delay_ms)
    }

    pub fn online_retry_interval(&self) -> Duration {
        Duration::from_millis(self.online_retry_interval_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
