//! Command dispatch for the binary

use crate::cli::{Cli, Command, PlatformArg};
use crate::config::Config;
use crate::pool::WorkerPool;
use crate::report;
use crate::sync::SyncPipeline;
use anyhow::{Context, Result};
use chrono::Utc;
use device_store::{DeviceRepository, DeviceService, RedbStore};
use mra_client::MraClient;
use risk_analyzer::{Analysis, Analyzer};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(cli: Cli, config: Config, cancel: CancellationToken) -> Result<()> {
    if let Some(Command::Vulns { platform, version }) = &cli.command {
        return lookup_vulnerabilities(&config, cancel, *platform, version).await;
    }

    let store = RedbStore::open(&config.db_path)
        .with_context(|| format!("Error initializing database at {}", config.db_path.display()))?;
    let service = Arc::new(DeviceService::new(DeviceRepository::new(store)));
    info!("Device cache opened at {}", config.db_path.display());

    match cli.command {
        Some(Command::Stats) => print_statistics(&service).await,
        _ if cli.local => analyze_local(&service).await,
        _ => sync_and_analyze(&config, service, cancel).await,
    }
}

/// Run cache scans on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("Cache task failed")?
}

async fn analyze(service: &Arc<DeviceService<RedbStore>>) -> Result<Analysis> {
    let analyzer = Analyzer::new(Arc::clone(service));
    blocking(move || analyzer.analyze().context("Error analyzing devices")).await
}

async fn analyze_local(service: &Arc<DeviceService<RedbStore>>) -> Result<()> {
    let analysis = analyze(service).await?;

    let json = serde_json::to_string_pretty(&analysis).context("Error formatting analysis")?;
    println!("{}", json);
    Ok(())
}

async fn print_statistics(service: &Arc<DeviceService<RedbStore>>) -> Result<()> {
    let service = Arc::clone(service);
    let stats = blocking(move || {
        service
            .compute_statistics(Utc::now())
            .context("Error computing statistics")
    })
    .await?;
    println!("{}", report::render_statistics(&stats));
    Ok(())
}

async fn sync_and_analyze(
    config: &Config,
    service: Arc<DeviceService<RedbStore>>,
    cancel: CancellationToken,
) -> Result<()> {
    let client = Arc::new(
        MraClient::new(config.client_config(), cancel.clone())
            .context("Error creating API client")?,
    );

    let pipeline = SyncPipeline::new(
        client.clone(),
        Arc::clone(&service),
        WorkerPool::new(config.worker_count),
        config.batch_size,
        cancel,
    );

    let sync = pipeline
        .run(|progress| {
            print!("\r{}", report::format_progress(&progress));
            let _ = std::io::stdout().flush();
        })
        .await
        .context("Error processing devices")?;

    println!("\n{}\n", report::format_completion(&sync));
    info!("API retries performed: {}", client.retries_performed());

    let analysis = analyze(&service).await?;
    print!("{}", report::render_summary(&analysis));

    print_statistics(&service).await
}

async fn lookup_vulnerabilities(
    config: &Config,
    cancel: CancellationToken,
    platform: PlatformArg,
    version: &str,
) -> Result<()> {
    let client = MraClient::new(config.client_config(), cancel).context("Error creating API client")?;

    let vulns = client
        .get_vulnerabilities(platform.as_str(), version)
        .await
        .with_context(|| format!("Error fetching {} vulnerabilities for {}", platform.as_str(), version))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&vulns).context("Error formatting vulnerabilities")?
    );
    Ok(())
}
