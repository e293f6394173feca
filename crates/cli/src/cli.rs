// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const QUICKSTART_HELP: &str = "\
Get started:
  ripple config path        Show where the config file is read from
  ripple config show        Print the effective configuration
  ripple watch              Connect and follow receipts until Ctrl-C";

#[derive(Parser)]
#[command(name = "ripple")]
#[command(version)]
#[command(about = "Keep a realtime chat connection alive and follow its read receipts")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: $RIPPLE_CONFIG or the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect and print connection and receipt activity until Ctrl-C
    #[command(after_help = "Examples:\n  \
        ripple watch                   Follow connection and receipt changes\n  \
        ripple watch --all-events      Also print every other server event\n  \
        ripple -c dev.toml watch       Use a specific config file")]
    Watch {
        /// Print every server event, not just connection and receipt changes
        #[arg(long)]
        all_events: bool,
    },

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path that would be used
    Path,

    /// Print the effective configuration with the token redacted
    Show,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
