//! Render Cache - document generation server with bounded caches
//!
//! Serves the generation pipeline and cache diagnostics over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use render_cache::api::{create_router, AppState};
use render_cache::{CacheOrchestrator, Config, GenerationPipeline, PlaceholderRenderer};

/// Main entry point for the render cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache orchestrator and start its maintenance task
/// 4. Start the generation pipeline and its worker pool
/// 5. Serve the diagnostics API on the configured port
/// 6. On SIGINT/SIGTERM, destroy the orchestrator and stop the workers
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to info, overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "render_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Render Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, workers={}, worker_timeout={:?}, memory_budget={} bytes, cleanup_interval={:?}",
        config.server_port,
        config.pipeline.worker_count,
        config.pipeline.task_timeout,
        config.orchestrator.total_memory_budget,
        config.orchestrator.cleanup_interval
    );

    let orchestrator = Arc::new(CacheOrchestrator::new(config.orchestrator.clone()));
    orchestrator.start();
    info!("Cache orchestrator started");

    let pipeline = Arc::new(GenerationPipeline::new(
        orchestrator.clone(),
        Arc::new(PlaceholderRenderer::default()),
        config.pipeline.clone(),
    ));

    let app = create_router(AppState::new(pipeline.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    pipeline.shutdown();
    orchestrator.destroy().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
