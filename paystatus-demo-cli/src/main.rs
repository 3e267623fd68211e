//! Payment Status CLI
//!
//! Watches a payment over the merchant-status websocket and exercises the
//! reducer and link helpers offline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "paystatus")]
#[command(about = "Watch crypto payment status in real time", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a payment until it completes, expires or fails
    Watch {
        /// Payment identifier returned by the order endpoint
        identifier: String,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Status endpoint base (overrides config and environment)
        #[arg(long)]
        endpoint: Option<String>,

        /// Treat a completion code as final even without a confirmed amount
        #[arg(long)]
        lenient: bool,

        /// Give up after this many seconds
        #[arg(short, long)]
        timeout_secs: Option<u64>,
    },

    /// Decode and reduce one status payload offline
    Reduce {
        /// Raw JSON payload, e.g. '{"status":"CO","confirmed_amount":25.5}'
        payload: String,

        /// Treat a completion code as final even without a confirmed amount
        #[arg(long)]
        lenient: bool,
    },

    /// Show the shareable link and QR code for a payment web url
    Link {
        /// Web url from the order response
        web_url: String,

        /// Skip the QR code
        #[arg(long)]
        no_qr: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("paystatus_demo_cli=debug,paystatus_lib=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("paystatus_demo_cli=info,paystatus_lib=warn")
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Watch {
            identifier,
            config,
            endpoint,
            lenient,
            timeout_secs,
        } => {
            let options = commands::watch::WatchOptions {
                identifier,
                config,
                endpoint,
                lenient,
                timeout_secs,
            };
            let outcome = commands::watch::run(options, cli.verbose).await?;
            let code = outcome.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Reduce { payload, lenient } => {
            commands::reduce::run(&payload, lenient, cli.verbose)?;
        }
        Commands::Link { web_url, no_qr } => {
            commands::link::run(&web_url, !no_qr, cli.verbose)?;
        }
    }

    Ok(())
}
