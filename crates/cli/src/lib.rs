// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ripple - command line front end for the ripple realtime client.
//!
//! Loads a [`rp_client::ClientConfig`], keeps a connection alive with
//! [`rp_client::ConnectionManager`] and feeds every server event into an
//! [`rp_core::ReceiptTracker`] so read and delivery progress can be watched
//! live.

mod cli;
pub mod config;
mod display;
mod env;
pub mod error;
mod watch;

pub use cli::{Cli, Command, ConfigCommand};
pub use error::{Error, Result};

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` selects debug output.
/// Logs go to stderr so they never mix with command output.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let explicit = cli.config.as_deref();
    match cli.command {
        Command::Watch { all_events } => {
            let config = config::load(explicit)?;
            watch::run(config, all_events).await
        }
        Command::Config(ConfigCommand::Path) => {
            println!("{}", config::resolve_path(explicit)?.display());
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let config = config::load(explicit)?;
            print!("{}", display::render_config(&config)?);
            Ok(())
        }
    }
}
