// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use datacom_runtime::cli;
use datacom_runtime::config::Config;
use datacom_runtime::service::DEFAULT_TIMEOUT_SECS;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(
    name = "datacom",
    about = "Upcoming ex-dividend (data-com) dates for investment wallets",
    version
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API until Ctrl-C
    Serve {
        /// Address to listen on (overrides DATACOM_BIND)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Enrich one wallet and print the report as JSON
    Fetch {
        /// Wallet page URL
        wallet_url: String,
        /// Time budget in seconds, clamped to 5..=55
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: i64,
    },
    /// Read a wallet's buy/sell history and print it as JSON
    Entries {
        /// Wallet entries page URL
        entries_url: String,
        /// Time budget in seconds, clamped to 5..=55
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    cli::init_tracing(args.verbose, args.log_json);

    let mut config = Config::from_env()?;
    let result = match args.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            cli::serve::run(config).await
        }
        Commands::Fetch {
            wallet_url,
            timeout,
        } => cli::fetch::run(&config, &wallet_url, timeout).await,
        Commands::Entries {
            entries_url,
            timeout,
        } => cli::fetch::run_entries(&config, &entries_url, timeout).await,
    };

    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
    result
}
