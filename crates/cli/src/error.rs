// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use rp_client::{ConfigError, ConnectError};
use thiserror::Error;

/// All possible errors that can occur in the ripple CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no config file at {}\n  hint: create one or pass --config <file>", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("cannot determine a config location\n  hint: pass --config <file> or set RIPPLE_CONFIG")]
    NoConfigPath,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("connection failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
