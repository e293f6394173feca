// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Locating and loading the client configuration.
//!
//! The file is chosen in this order: `--config`, `RIPPLE_CONFIG`, then
//! `ripple/config.toml` under the platform config directory. A non-empty
//! `RIPPLE_TOKEN` replaces whatever token the file carries.

use std::path::{Path, PathBuf};

use rp_client::ClientConfig;

use crate::env;
use crate::error::{Error, Result};

pub const CONFIG_DIR_NAME: &str = "ripple";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// `ripple/config.toml` under the platform config directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(env::config_path)
        .or_else(default_path)
        .ok_or(Error::NoConfigPath)
}

/// Load and validate the config, then apply environment overrides.
pub fn load(explicit: Option<&Path>) -> Result<ClientConfig> {
    let path = resolve_path(explicit)?;
    load_from(&path, env::token())
}

pub(crate) fn load_from(path: &Path, token_override: Option<String>) -> Result<ClientConfig> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }
    let mut config = ClientConfig::load(path)?;
    if let Some(token) = token_override {
        config.token = Some(token);
    }
    Ok(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
