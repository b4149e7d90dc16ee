use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use inquiry_core::analysis::KeywordAnalyzer;
use inquiry_pipeline::{reconcile, PipelineConfig, ResearchService};
use inquiry_sources::{build_fetcher, SourcesConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inquiry_api::config::ServerConfig;
use inquiry_api::router::build_app_router;
use inquiry_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "inquiry_api=debug,inquiry_pipeline=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pipeline = PipelineConfig::from_env();
    pipeline
        .validate()
        .expect("Invalid pipeline configuration");
    tracing::info!(
        mode = ?pipeline.execution_mode,
        hard_timeout_secs = pipeline.hard_timeout.as_secs(),
        soft_timeout_secs = pipeline.soft_timeout.as_secs(),
        "Loaded pipeline configuration"
    );

    // --- Job store ---
    let backend = inquiry_db::connect(&config.database_url, config.database_max_connections)
        .await
        .expect("Failed to connect to job store");

    backend
        .jobs
        .health_check()
        .await
        .expect("Job store health check failed");
    tracing::info!("Job store health check passed");

    // --- Collaborators ---
    let fetcher = build_fetcher(&SourcesConfig::from_env()).expect("Failed to build data sources");

    // --- Reconciliation sweep ---
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(reconcile::run(
        Arc::clone(&backend.jobs),
        Arc::clone(&backend.queue),
        pipeline.stale_after(),
        pipeline.sweep_interval,
        sweep_cancel.clone(),
    ));

    // --- App state ---
    let research = ResearchService::new(
        Arc::clone(&backend.jobs),
        Arc::clone(&backend.queue),
        Arc::new(fetcher),
        Arc::new(KeywordAnalyzer::default()),
        pipeline,
    );
    let state = AppState {
        research: research.clone(),
        config: Arc::new(config.clone()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, research.shutdown()).await.is_err() {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Inline executions still running at shutdown; the sweep will fail them"
        );
    }

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("Reconciliation sweep stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
