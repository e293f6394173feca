// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use clap::CommandFactory;
use yare::parameterized;

#[test]
fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[parameterized(
    plain = { &["ripple", "watch"], false },
    all_events = { &["ripple", "watch", "--all-events"], true },
)]
fn parse_watch(args: &[&str], expected: bool) {
    let cli = Cli::try_parse_from(args).unwrap();
    match cli.command {
        Command::Watch { all_events } => assert_eq!(all_events, expected),
        _ => panic!("expected watch"),
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["ripple", "config", "show", "-v", "-c", "/tmp/r.toml"]).unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.toml")));
    assert!(matches!(cli.command, Command::Config(ConfigCommand::Show)));
}

#[test]
fn test_config_path_subcommand() {
    let cli = Cli::try_parse_from(["ripple", "config", "path"]).unwrap();
    assert!(!cli.verbose);
    assert!(cli.config.is_none());
    assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
}

#[test]
fn test_missing_subcommand_is_error() {
    assert!(Cli::try_parse_from(["ripple"]).is_err());
}
