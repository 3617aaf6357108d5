mod cli;
mod config_loader;
mod display;

use anyhow::{anyhow, Context};
use chainsync_client::{ReplayChain, ReplayConnection, SyncOrchestrator, SyncOutcome};
use chainsync_common::utils::logging::init_logging;
use chainsync_common::SyncError;
use clap::Parser;
use std::process::ExitCode;
use tokio::signal;
use tracing::{info, warn};

use crate::config_loader::AppConfig;
use crate::display::ConsoleConsumer;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<SyncError>() {
                Some(sync_err) => eprintln!("ERROR: {} ({})", sync_err, sync_err.hint()),
                None => eprintln!("ERROR: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: cli::Cli) -> anyhow::Result<()> {
    let config = config_loader::load_app_config(&args)?;

    // Hold the guard so the file writer flushes on exit
    let _guard = init_logging(&config.logging).map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting chainsync v{}", env!("CARGO_PKG_VERSION"));
    log_config(&config);

    let replay = config
        .replay_file
        .as_ref()
        .context("no node transport is linked into this build; pass --replay <file.json> to follow a recorded chain")?;
    let chain = ReplayChain::from_file(replay)?;
    info!("Loaded {} recorded blocks from {}", chain.blocks.len(), replay.display());

    let connection = ReplayConnection::new(chain).hold_open();
    let consumer = ConsoleConsumer::new(std::io::stdout(), config.verbose);
    let orchestrator = SyncOrchestrator::new(config.sync.clone(), connection, consumer)?;
    let handle = orchestrator.handle();

    let outcome = orchestrator.run_until(shutdown_signal()).await?;

    let stats = handle.stats().await;
    match outcome {
        SyncOutcome::RangeReported { .. } => {}
        SyncOutcome::RangeFetched { blocks } => info!("Fetched {} blocks", blocks),
        SyncOutcome::Shutdown => info!("Shutting down gracefully"),
    }
    info!(
        "Delivered {} blocks, {} rollbacks in {:.1?}",
        stats.blocks_delivered,
        stats.rollbacks,
        stats.elapsed()
    );
    Ok(())
}

fn log_config(config: &AppConfig) {
    let sync = &config.sync;
    info!("Configuration:");
    info!("  Network: {}", sync.network_name());
    info!("  Transport: {}", sync.transport());
    if sync.tip {
        info!("  Start: chain tip");
    } else {
        info!("  Start era: {}", sync.start_era);
    }
    info!("  Mode: {:?}{}", sync.mode(), if sync.block_range { " (range only)" } else { "" });
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
