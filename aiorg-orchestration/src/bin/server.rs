//! Thin wrapper binary for running the orchestration core as a standalone
//! server: bootstraps the Store, LLM provider, Notifier, and worker pool,
//! then blocks until shutdown.

use std::sync::Arc;

use aiorg_orchestration::config::AiOrgConfig;
use aiorg_orchestration::llm::{BoundedLlmProvider, FailingLlmProvider};
use aiorg_orchestration::notifier::LoggingNotifier;
use aiorg_orchestration::{AiOrgService, Store, WorkerPool};
use aiorg_shared::{logging, EventBus};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    info!("Starting AI Organization orchestration server...");
    info!(version = env!("CARGO_PKG_VERSION"), "   Version");

    let config = AiOrgConfig::load(std::env::var("AIORG_CONFIG_PATH").ok().as_deref())?;

    let store = Arc::new(Store::connect(&config.database.url).await?);
    let events = Arc::new(EventBus::new());

    // No production LLM backend ships with this crate (out of scope, §6.1);
    // operators are expected to wire a real `LlmProvider` in before launch.
    let llm = Arc::new(BoundedLlmProvider::new(Arc::new(FailingLlmProvider), config.execution.max_concurrent_llm_calls));
    let notifier = Arc::new(LoggingNotifier);

    let service = Arc::new(AiOrgService::new(store.clone(), events, llm, notifier, config.execution.clone()));
    let workers = WorkerPool::spawn(service, store, config.execution, config.hitl);

    info!("Orchestration server started, press Ctrl+C to shut down");
    shutdown_signal().await;

    info!("Shutdown signal received, stopping worker pool...");
    workers.shutdown().await;
    info!("Orchestration server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
