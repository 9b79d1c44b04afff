//! Device Sync
//!
//! Main entry point: sync-then-analyze by default, cache-only analysis with
//! `--local`.

use anyhow::{Context, Result};
use clap::Parser;
use device_sync::{app, cli::Cli, Config};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env(cli.offline()).context("Error loading configuration")?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Device Sync");
    info!("  Environment: {}", config.app_env);
    info!("  Local mode: {}", config.local_mode);
    info!("  Workers: {}, batch size: {}", config.worker_count, config.batch_size);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, shutting down gracefully");
        signal_token.cancel();
    });

    let grace = config.shutdown_timeout();
    let work = app::run(cli, config, cancel.clone());

    tokio::select! {
        result = work => result,
        _ = async {
            cancel.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!("Pipeline still running {:?} after shutdown signal", grace);
            anyhow::bail!("Shutdown timed out after {}s", grace.as_secs())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
