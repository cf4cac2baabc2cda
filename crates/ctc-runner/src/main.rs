//! # ctc-runner
//!
//! Main entry point for the trade collector.
//!
//! Loads a JSON configuration file, connects the persistence boundary,
//! starts one feed module per configured source and the batch flush loop,
//! then runs until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! ctc-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

/// Crypto Trade Collector Runner.
#[derive(Parser)]
#[command(name = "ctc-runner", about = "Crypto Trade Collector Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration first — it may carry the log path.
    let config = ctc_core::config::load_config(&cli.config)?;

    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    ctc_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());

    info!(
        "ctc-runner starting — config={}, {} source(s), store={}",
        cli.config.display(),
        config.sources.len(),
        config.store.url,
    );

    // 2. Connect the persistence boundary. Without storage there is nothing
    //    to collect into, so this failure is fatal.
    let store = Arc::new(ctc_store::RedisStore::connect(&config.store).await?);

    // 3. Shared buffer + flush loop.
    let (writer, drain) = ctc_core::buffer::trade_buffer();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flush_task = tokio::spawn(ctc_core::flush::run_flush_loop(drain, store, shutdown_rx));

    // 4. Create and start feed modules. One failing source must not take the
    //    others down; the process outlives any single feed's health.
    let mut feeds: Vec<Box<dyn ctc_feed::FeedModule>> = Vec::new();
    for (idx, source) in config.sources.iter().enumerate() {
        match ctc_feed::registry::create_feed(source, writer.clone()) {
            Ok(feed) => {
                info!("source[{idx}]: created feed module '{}'", feed.name());
                feeds.push(feed);
            }
            Err(e) => {
                error!("source[{idx}]: failed to create module for '{}': {e}", source.exchange);
            }
        }
    }

    for feed in &mut feeds {
        match feed.start().await {
            Ok(()) => info!("feed '{}' started", feed.name()),
            Err(e) => error!("feed '{}' failed to start: {e}", feed.name()),
        }
    }

    info!("collector running — press Ctrl+C to stop");

    // 5. Wait for shutdown signal.
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 6. Stop the feeds first so no new records arrive, then let the flush
    //    loop drain what is left.
    for feed in &mut feeds {
        info!("stopping feed '{}'", feed.name());
        if let Err(e) = feed.stop().await {
            error!("error stopping '{}': {e}", feed.name());
        }
    }
    drop(writer);
    let _ = shutdown_tx.send(true);
    let _ = flush_task.await;

    info!("collector stopped — goodbye");
    Ok(())
}
