// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    config_not_found = {
        Error::ConfigNotFound(PathBuf::from("/home/a/.config/ripple/config.toml")),
        "no config file at /home/a/.config/ripple/config.toml\n  hint: create one or pass --config <file>"
    },
    no_config_path = {
        Error::NoConfigPath,
        "cannot determine a config location\n  hint: pass --config <file> or set RIPPLE_CONFIG"
    },
    invalid_config = {
        Error::Config(ConfigError::Invalid("user_id is empty".into())),
        "invalid config: user_id is empty"
    },
    connect = {
        Error::Connect(ConnectError::Rejected { reason: "banned".into() }),
        "connection failed: connection rejected by server: banned"
    },
)]
fn error_display(err: Error, expected: &str) {
    assert_eq!(err.to_string(), expected);
}
