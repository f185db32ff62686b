//! connlimitd: a TCP listener gated by per-identifier connection limits.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ LimiterConfig ──▶ ConnLimitRegistry (one per process)
//!                                           ▲
//!   Client ──▶ GatedListener ── try_establish ┘
//!                   │
//!                   └──▶ connection task (holds ConnectionGuard → on_lost)
//! ```

use std::path::PathBuf;

use clap::Parser;

use conn_limit::config::{load_config, LimiterConfig};
use conn_limit::lifecycle::{signals, startup};
use conn_limit::observability::logging;
use conn_limit::Shutdown;

#[derive(Parser)]
#[command(name = "connlimitd")]
#[command(about = "TCP listener limiting distinct client addresses per identifier", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every registry decision at debug level.
    #[arg(long)]
    debug_log: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LimiterConfig::default(),
    };
    config.debug_log |= cli.debug_log;

    logging::init(&config.observability, config.debug_log)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        identifier = %config.listener.identifier,
        limits = config.limits.len(),
        debug_log = config.debug_log,
        "Configuration loaded"
    );

    let listener = startup::bind(&config).await?;

    let shutdown = Shutdown::new();
    let server = tokio::spawn(startup::serve(listener, shutdown.subscribe()));

    signals::wait_for_signal().await?;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();

    server.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
