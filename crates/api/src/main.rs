use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retroreel_api::config::ServerConfig;
use retroreel_api::engine::{
    spawn_generation_driver, spawn_queue_retention_sweep, GenerationClient, GenerationQueue,
};
use retroreel_api::router::build_app_router;
use retroreel_api::state::AppState;
use retroreel_effects::{spawn_retention_sweep, EffectOrchestrator, OrchestratorConfig};
use retroreel_seedance::SeedanceClient;
use retroreel_store::MetadataStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retroreel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Metadata store ---
    let store = Arc::new(
        MetadataStore::open(&config.data_dir)
            .await
            .expect("Failed to open metadata store"),
    );
    tracing::info!(data_dir = %config.data_dir.display(), "Metadata store opened");

    // --- Generation provider ---
    if config.ark_api_key.is_empty() {
        tracing::warn!("ARK_API_KEY is empty; upstream generation calls will be rejected");
    }
    let mut provider =
        SeedanceClient::new(config.ark_api_key.clone()).expect("Failed to build Seedance client");
    if let Some(base_url) = &config.ark_base_url {
        provider = provider.with_base_url(base_url.clone());
    }

    // --- Generation queue and driver ---
    let queue = Arc::new(GenerationQueue::new(config.avg_processing_secs));
    let client = Arc::new(GenerationClient::new(Arc::new(provider), Arc::clone(&store)));

    let cancel = tokio_util::sync::CancellationToken::new();
    let driver_handle =
        spawn_generation_driver(Arc::clone(&queue), client, cancel.child_token());

    let retention = Duration::from_secs(config.job_retention_secs);
    let queue_sweep_handle =
        spawn_queue_retention_sweep(Arc::clone(&queue), retention, cancel.child_token());

    // --- Effect orchestrator ---
    let effects = Arc::new(EffectOrchestrator::new(
        Arc::clone(&store),
        OrchestratorConfig {
            processor_dir: config.processor_dir.clone(),
            interpreter: "python3".to_string(),
            max_concurrency: config.effect_concurrency,
        },
    ));
    let effect_jobs = effects.jobs();
    let effect_sweep_handle =
        spawn_retention_sweep(Arc::clone(&effect_jobs), retention, cancel.child_token());
    tracing::info!(
        processor_dir = %config.processor_dir.display(),
        concurrency = config.effect_concurrency,
        "Effect orchestrator started",
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        queue,
        effects,
        effect_jobs,
    };

    // --- Router ---
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

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), driver_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), queue_sweep_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), effect_sweep_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
