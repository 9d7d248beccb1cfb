//! Helios Edge daemon entry point.

use anyhow::Context;
use clap::Parser;
use helios_edge::config::EdgeConfig;
use helios_edge::delivery::BackendClient;
use helios_edge::pipeline::{Pipeline, PipelineSettings};
use helios_edge::store::{SledTelemetryStore, WatermarkStore};
use helios_edge::scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "helios-edge",
    about = "Windowed aggregation and delivery for solar telemetry",
    version
)]
struct CliArgs {
    /// Path to a TOML config file (overrides the default search order)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single aggregation cycle and exit
    #[arg(long)]
    once: bool,

    /// Forget the watermark before starting; everything gets redelivered
    #[arg(long)]
    reset_watermark: bool,

    /// Wipe the entire local database (samples and state) before starting
    #[arg(long)]
    reset_db: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => EdgeConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EdgeConfig::load(),
    };
    info!(
        device = %config.device.device_id,
        period_minutes = config.aggregation.period_minutes,
        backend = %config.backend.base_url,
        "Helios Edge starting"
    );
    if config.backend.email.is_empty() {
        warn!("No backend credentials configured; logins will be rejected");
    }

    let store = SledTelemetryStore::open(&config.storage.data_dir)
        .with_context(|| format!("opening telemetry store at {}", config.storage.data_dir.display()))?;

    if args.reset_db {
        store.clear().context("clearing database")?;
        warn!("Database cleared; samples and state are gone");
    }

    let watermark = WatermarkStore::new(Arc::new(store.clone()));
    if args.reset_watermark {
        watermark.reset().context("resetting watermark")?;
        warn!("Watermark reset; all stored windows will be redelivered");
    }

    let sink = BackendClient::new(
        &config.backend.base_url,
        &config.backend.email,
        &config.backend.password,
        config.backend.login_timeout_secs,
        config.backend.post_timeout_secs,
    )
    .context("building backend client")?;

    let mut pipeline = Pipeline::new(store, sink, watermark, PipelineSettings::from(&config));

    if args.once {
        let report = pipeline.run_cycle().await.context("running cycle")?;
        info!(
            identified = report.windows_identified,
            delivered = report.delivered,
            skipped_empty = report.skipped_empty,
            "Single cycle complete"
        );
        if let Some(outcome) = report.stopped_on {
            anyhow::bail!("cycle stopped early: {outcome}");
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    scheduler::run(
        pipeline,
        config.aggregation.period_minutes,
        config.aggregation.settle_offset_secs,
        shutdown,
    )
    .await;

    info!("Helios Edge stopped");
    Ok(())
}
