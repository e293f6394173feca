// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use ripple::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    ripple::init_logging(cli.verbose);
    if let Err(e) = ripple::run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
