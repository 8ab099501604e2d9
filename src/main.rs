//! Thin CLI wrapper around the orchestration service bootstrap.
//!
//! The root crate carries no orchestration logic of its own; it exists so
//! operators have a single binary to invoke without depending directly on
//! `aiorg-orchestration`.

use std::sync::Arc;

use aiorg_orchestration::config::AiOrgConfig;
use aiorg_orchestration::llm::{BoundedLlmProvider, FailingLlmProvider};
use aiorg_orchestration::notifier::LoggingNotifier;
use aiorg_orchestration::{AiOrgService, Store, WorkerPool};
use aiorg_shared::EventBus;
use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "aiorg-core", version, about = "AI Organization task orchestration engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and print the resolved configuration without starting the service.
    CheckConfig {
        #[arg(long)]
        config: Option<String>,
    },
    /// Start the orchestration service (worker pool + HITL sweeper).
    Run {
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig { config } => {
            let resolved = AiOrgConfig::load(config.as_deref()).context("failed to load configuration")?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Command::Run { config } => run(config).await?,
    }

    Ok(())
}

async fn run(config_path: Option<String>) -> anyhow::Result<()> {
    let config = AiOrgConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    let store = Arc::new(Store::connect(&config.database.url).await.context("failed to connect to database")?);
    let events = Arc::new(EventBus::new());
    let llm = Arc::new(BoundedLlmProvider::new(Arc::new(FailingLlmProvider), config.execution.max_concurrent_llm_calls));
    let notifier = Arc::new(LoggingNotifier);

    let service = Arc::new(AiOrgService::new(store.clone(), events, llm, notifier, config.execution.clone()));
    let workers = WorkerPool::spawn(service, store, config.execution, config.hitl);

    tracing::info!("orchestration service started, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    tracing::info!("shutdown signal received");
    workers.shutdown().await;
    Ok(())
}
