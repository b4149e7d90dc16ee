use std::sync::Arc;

use anyhow::Context;
use inquiry_core::analysis::KeywordAnalyzer;
use inquiry_pipeline::{reconcile, PipelineConfig, StepExecutor};
use inquiry_sources::{build_fetcher, SourcesConfig};
use inquiry_worker::{QueueWorker, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // --- Configuration ---
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://inquiry.db?mode=rwc".into());
    let max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
        .map(|v| v.parse().expect("DATABASE_MAX_CONNECTIONS must be a valid u32"))
        .unwrap_or(inquiry_db::DEFAULT_MAX_CONNECTIONS);
    let pipeline = PipelineConfig::from_env();
    pipeline.validate().context("invalid pipeline configuration")?;
    let worker_config = WorkerConfig::from_env();

    // --- Store ---
    let backend = inquiry_db::connect(&database_url, max_connections)
        .await
        .context("failed to connect to job store")?;

    // --- Executor ---
    let fetcher = build_fetcher(&SourcesConfig::from_env()).context("failed to build data sources")?;
    let stale_after = pipeline.stale_after();
    let sweep_interval = pipeline.sweep_interval;
    let executor = Arc::new(StepExecutor::new(
        Arc::clone(&backend.jobs),
        Arc::new(fetcher),
        Arc::new(KeywordAnalyzer::default()),
        pipeline,
    ));

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let sweep = tokio::spawn(reconcile::run(
        Arc::clone(&backend.jobs),
        Arc::clone(&backend.queue),
        stale_after,
        sweep_interval,
        cancel.clone(),
    ));

    let worker = QueueWorker::new(Arc::clone(&backend.queue), executor, worker_config);
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    worker.run(cancel).await;
    let _ = sweep.await;
    tracing::info!("Worker stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "inquiry_worker=debug,inquiry_pipeline=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
