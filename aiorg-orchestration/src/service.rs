//! `AiOrgService`: the single facade the outside world calls (§6.2). Owns
//! the Store, Event Bus, Task Engine, and HITL Manager and wires entry
//! points to them; carries no state of its own beyond those `Arc`s.

use std::sync::Arc;

use aiorg_shared::database::{HitlQueueItem, Response, Task, TaskPriority};
use aiorg_shared::{AiOrgError, AiOrgResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::engine::TaskEngine;
use crate::hitl::HitlManager;
use crate::llm::BoundedLlmProvider;
use crate::notifier::Notifier;
use crate::org_lifecycle;
use crate::store::Store;

/// Boundary validation for `submit_task` (§4.1 edge: empty title/description
/// refused before a Task row is ever created).
#[derive(Debug, Validate)]
struct SubmitTaskInput<'a> {
    #[validate(length(min = 1, max = 500))]
    title: &'a str,
    #[validate(length(min = 1))]
    description: &'a str,
}

/// Recursive view of a task and its delegation subtree, as returned by
/// `get_task_tree`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskTreeNode {
    pub task: Task,
    pub node_label: String,
    pub responses: Vec<Response>,
    pub subtasks: Vec<TaskTreeNode>,
}

/// A pending HITL item enriched with the labels a reviewer needs without a
/// second round trip.
#[derive(Debug, Clone, Serialize)]
pub struct HitlPendingEntry {
    pub item: HitlQueueItem,
    pub node_role_name: String,
    pub task_title: String,
}

pub struct AiOrgService {
    store: Arc<Store>,
    events: Arc<aiorg_shared::EventBus>,
    engine: Arc<TaskEngine>,
    hitl: Arc<HitlManager>,
}

impl AiOrgService {
    pub fn new(
        store: Arc<Store>,
        events: Arc<aiorg_shared::EventBus>,
        llm: Arc<BoundedLlmProvider>,
        notifier: Arc<dyn Notifier>,
        exec_config: crate::config::ExecutionConfig,
    ) -> Self {
        let hitl = Arc::new(HitlManager::new(store.clone(), events.clone(), notifier.clone()));
        let engine = Arc::new(TaskEngine::new(store.clone(), events.clone(), llm, notifier, hitl.clone(), exec_config));
        Self { store, events, engine, hitl }
    }

    pub fn events(&self) -> &Arc<aiorg_shared::EventBus> {
        &self.events
    }

    pub fn engine(&self) -> &Arc<TaskEngine> {
        &self.engine
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn submit_task(
        &self,
        org_id: Uuid,
        assigned_node_id: Uuid,
        title: &str,
        description: &str,
        input_data: Value,
        priority: TaskPriority,
        _deadline: Option<DateTime<Utc>>,
        _submitted_by: &str,
    ) -> AiOrgResult<Task> {
        SubmitTaskInput { title, description }
            .validate()
            .map_err(|e| AiOrgError::validation(e.to_string()))?;

        let org = self.store.get_org(org_id).await?.ok_or(AiOrgError::NotFound { kind: "org", id: org_id })?;
        org_lifecycle::can_submit_task(org.status)?;
        self.store
            .get_node(assigned_node_id)
            .await?
            .ok_or(AiOrgError::NotFound { kind: "node", id: assigned_node_id })?;

        let task = self.store.create_task(org_id, None, assigned_node_id, title, description, input_data, priority).await?;
        self.events.publish(
            org_id,
            aiorg_shared::event_bus::AiOrgEvent::new(
                aiorg_shared::event_bus::AiOrgEventType::TaskSubmitted,
                serde_json::json!({"task_id": task.task_id}),
            ),
        );
        let _ = self
            .store
            .write_event_log(org_id, "TASK_SUBMITTED", None, Some(assigned_node_id), Some(task.task_id), serde_json::json!({}))
            .await;
        Ok(task)
    }

    pub async fn get_task_tree(&self, task_id: Uuid) -> AiOrgResult<TaskTreeNode> {
        self.build_tree(task_id).await
    }

    fn build_tree<'a>(&'a self, task_id: Uuid) -> std::pin::Pin<Box<dyn std::future::Future<Output = AiOrgResult<TaskTreeNode>> + Send + 'a>> {
        Box::pin(async move {
            let task = self.store.get_task(task_id).await?.ok_or(AiOrgError::NotFound { kind: "task", id: task_id })?;
            let node = self.store.get_node(task.assigned_node_id).await?.ok_or(AiOrgError::NotFound { kind: "node", id: task.assigned_node_id })?;
            let responses = self.store.get_task_responses(task_id).await?;
            let children = self.store.get_subtasks(task_id).await?;

            let mut subtasks = Vec::with_capacity(children.len());
            for child in children {
                subtasks.push(self.build_tree(child.task_id).await?);
            }

            Ok(TaskTreeNode { task, node_label: node.role_name, responses, subtasks })
        })
    }

    pub async fn get_org_active_tasks(&self, org_id: Uuid) -> AiOrgResult<Vec<Task>> {
        self.store.get_active_tasks(org_id).await
    }

    pub async fn hitl_list_pending(&self, user_email: &str) -> AiOrgResult<Vec<HitlPendingEntry>> {
        let nodes = self.store.get_nodes_by_email(user_email).await?;
        let node_ids: Vec<Uuid> = nodes.iter().map(|n| n.node_id).collect();
        if node_ids.is_empty() {
            return Ok(Vec::new());
        }
        let items = self.store.get_pending_hitl_for_nodes(&node_ids).await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let node_role_name = nodes
                .iter()
                .find(|n| n.node_id == item.node_id)
                .map(|n| n.role_name.clone())
                .unwrap_or_default();
            let task_title = self.store.get_task(item.task_id).await?.map(|t| t.title).unwrap_or_default();
            entries.push(HitlPendingEntry { item, node_role_name, task_title });
        }
        Ok(entries)
    }

    pub async fn hitl_approve(&self, item_id: Uuid, user: &str, comment: Option<&str>) -> AiOrgResult<()> {
        let resolution = self.hitl.approve(item_id, user, comment).await?;
        self.engine.resume_after_hitl(resolution).await
    }

    pub async fn hitl_reject(&self, item_id: Uuid, user: &str, reason: &str) -> AiOrgResult<()> {
        let resolution = self.hitl.reject(item_id, user, reason).await?;
        self.engine.resume_after_hitl(resolution).await
    }

    pub async fn hitl_override(&self, item_id: Uuid, user: &str, new_content: Value, reason: &str) -> AiOrgResult<()> {
        let resolution = self.hitl.override_decision(item_id, user, new_content, reason).await?;
        self.engine.resume_after_hitl(resolution).await
    }

    pub async fn hitl_message(&self, item_id: Uuid, user: &str, message: &str) -> AiOrgResult<()> {
        self.hitl.add_message(item_id, user, message).await
    }

    pub async fn pause_node(&self, node_id: Uuid, user: &str, reason: Option<&str>) -> AiOrgResult<()> {
        self.hitl.pause_node(node_id, user, reason).await
    }

    pub async fn resume_node(&self, node_id: Uuid, user: &str) -> AiOrgResult<()> {
        self.hitl.resume_node(node_id, user).await
    }

    pub async fn sweep_hitl_timeouts(&self, now: DateTime<Utc>) -> AiOrgResult<usize> {
        let resolutions = self.hitl.check_timeouts(now).await?;
        let count = resolutions.len();
        for resolution in resolutions {
            self.engine.resume_after_hitl(resolution).await?;
        }
        Ok(count)
    }

    /// Test/CLI helper: drains every claimable task for `org_id` by
    /// repeatedly claiming and processing until the queue is empty. Not
    /// part of the worker pool's own loop (`worker.rs` polls all pollable
    /// orgs concurrently); this exists so integration tests can run a
    /// deterministic, single-threaded pass over one org's work.
    pub async fn drain(&self, org_id: Uuid) -> AiOrgResult<usize> {
        let mut processed = 0usize;
        while let Some(task) = self.store.claim_next_task(org_id).await? {
            self.engine.process_task(task).await?;
            processed += 1;
            if processed > 10_000 {
                break;
            }
        }
        Ok(processed)
    }
}
