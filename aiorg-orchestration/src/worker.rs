//! Worker pool and HITL sweeper (§5): a fixed set of loops pulling ready
//! work from the Store rather than an in-memory channel, so in-flight work
//! survives a process restart.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{ExecutionConfig, HitlSweepConfig};
use crate::service::AiOrgService;
use crate::store::Store;

/// Owns the spawned worker and sweeper tasks; dropping or calling `shutdown`
/// signals every loop to stop after its current iteration.
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `exec_config.worker_count` polling loops plus one HITL
    /// sweeper loop. Each worker iterates every org returned by
    /// `list_pollable_org_ids` and claims at most one task per org per
    /// pass, so no single busy org starves the others.
    pub fn spawn(service: Arc<AiOrgService>, store: Arc<Store>, exec_config: ExecutionConfig, hitl_config: HitlSweepConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let mut handles = Vec::with_capacity(exec_config.worker_count + 1);

        for worker_id in 0..exec_config.worker_count {
            let service = service.clone();
            let store = store.clone();
            let poll_interval = exec_config.worker_poll_interval();
            let mut shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                run_worker_loop(worker_id, service, store, poll_interval, &mut shutdown_rx).await;
            }));
        }

        {
            let service = service.clone();
            let sweep_interval = hitl_config.sweep_interval();
            let mut shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(async move {
                run_sweeper_loop(service, sweep_interval, &mut shutdown_rx).await;
            }));
        }

        Self { shutdown_tx, handles }
    }

    /// Signals every loop to stop and waits for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn run_worker_loop(
    worker_id: usize,
    service: Arc<AiOrgService>,
    store: Arc<Store>,
    poll_interval: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    tracing::info!(worker_id, "worker loop started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match poll_once(&service, &store).await {
            Ok(0) => {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(worker_id, error = %err, "worker poll failed, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
        }
    }
    tracing::info!(worker_id, "worker loop stopped");
}

async fn poll_once(service: &AiOrgService, store: &Store) -> aiorg_shared::AiOrgResult<usize> {
    let org_ids: Vec<Uuid> = store.list_pollable_org_ids().await?;
    let mut claimed = 0usize;
    for org_id in org_ids {
        if let Some(task) = store.claim_next_task(org_id).await? {
            service.engine().process_task(task).await?;
            claimed += 1;
        }
    }
    Ok(claimed)
}

async fn run_sweeper_loop(service: Arc<AiOrgService>, sweep_interval: Duration, shutdown_rx: &mut watch::Receiver<bool>) {
    tracing::info!("hitl sweeper loop started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match service.sweep_hitl_timeouts(chrono::Utc::now()).await {
            Ok(count) if count > 0 => tracing::info!(count, "hitl timeouts processed"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "hitl sweep failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(sweep_interval) => {}
            _ = shutdown_rx.changed() => {}
        }
    }
    tracing::info!("hitl sweeper loop stopped");
}
