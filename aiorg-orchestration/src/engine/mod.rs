//! The task state machine (C4): admits a task, decides delegate-or-execute,
//! fans out and back in, and finalizes. See module-level notes on the
//! recursion in `finalize`/`fail_task` below.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use aiorg_shared::database::{
    DelegationStrategy, HitlReviewType, Node, NodeType, ResponseType, Task, TaskPriority, TaskStatus,
};
use aiorg_shared::event_bus::{AiOrgEvent, AiOrgEventType};
use aiorg_shared::{AiOrgError, AiOrgResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::hitl::{HitlManager, HitlOutcome, HitlResolution};
use crate::llm::{BoundedLlmProvider, LlmRequest};
use crate::locks::KeyedLocks;
use crate::notifier::{Notifier, TaskCompletionNotice};
use crate::org_lifecycle;
use crate::prompts::{parse_analyze_response, parse_llm_response, PromptBuilder, SubordinateSummary};
use crate::store::Store;

type BoxedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One subtask as resolved from an LLM delegation plan (or synthesized as
/// the default plan). Serializable so sequential delegation can stash the
/// not-yet-admitted remainder in the parent task's `context` blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlannedSubtask {
    title: String,
    description: String,
    assigned_to: Uuid,
    priority: TaskPriority,
    instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DelegationPlan {
    strategy: DelegationStrategy,
    subtasks: Vec<PlannedSubtask>,
}

pub struct TaskEngine {
    store: Arc<Store>,
    events: Arc<aiorg_shared::EventBus>,
    llm: Arc<BoundedLlmProvider>,
    notifier: Arc<dyn Notifier>,
    hitl: Arc<HitlManager>,
    prompts: PromptBuilder,
    exec_config: ExecutionConfig,
    parent_locks: KeyedLocks,
}

impl TaskEngine {
    pub fn new(
        store: Arc<Store>,
        events: Arc<aiorg_shared::EventBus>,
        llm: Arc<BoundedLlmProvider>,
        notifier: Arc<dyn Notifier>,
        hitl: Arc<HitlManager>,
        exec_config: ExecutionConfig,
    ) -> Self {
        Self {
            store,
            events,
            llm,
            notifier,
            hitl,
            prompts: PromptBuilder::new(),
            exec_config,
            parent_locks: KeyedLocks::new(),
        }
    }

    async fn call_llm(&self, system: String, prompt: String, temperature: f32, max_tokens: u32) -> Option<String> {
        match self.llm.complete(LlmRequest { system, prompt, temperature, max_tokens }).await {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(error = %err, "llm call failed, degrading to default");
                None
            }
        }
    }

    /// Entry point for a task claimed by a worker (status `pending` or
    /// `waiting`). A `waiting` task found here is either ready to
    /// aggregate (all children terminal) or still genuinely waiting, in
    /// which case this is a no-op — the next event that matters (a child
    /// completing, or a HITL resume) drives it forward, not another poll.
    pub async fn process_task(&self, task: Task) -> AiOrgResult<()> {
        match task.status {
            TaskStatus::Pending => self.admit(task).await,
            TaskStatus::Waiting => {
                if task.context.get("hitl_suspended").and_then(Value::as_bool).unwrap_or(false) {
                    return Ok(());
                }
                if task.expected_responses > 0 && task.received_responses >= task.expected_responses {
                    self.aggregate(task).await
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    async fn admit(&self, task: Task) -> AiOrgResult<()> {
        let node = self.store.get_node(task.assigned_node_id).await?.ok_or(AiOrgError::NotFound { kind: "node", id: task.assigned_node_id })?;
        let org = self.store.get_org(task.org_id).await?.ok_or(AiOrgError::NotFound { kind: "org", id: task.org_id })?;

        if let Err(err) = org_lifecycle::can_admit_task(org.status, node.status) {
            tracing::debug!(task_id = %task.task_id, %err, "admission refused, task stays pending for retry");
            return Ok(());
        }

        let hitl = node.hitl_config();
        if hitl.wants_task_received() {
            if !self.store.try_transition_status(task.task_id, TaskStatus::Pending, TaskStatus::InProgress).await? {
                return Ok(());
            }
            self.hitl.queue_for_review(&node, &task, HitlReviewType::TaskReceived, None).await?;
            self.store.set_task_context(task.task_id, json!({"hitl_suspended": true})).await?;
            return Ok(());
        }

        if !self.store.try_transition_status(task.task_id, TaskStatus::Pending, TaskStatus::InProgress).await? {
            return Ok(());
        }
        self.events.publish(task.org_id, AiOrgEvent::new(AiOrgEventType::TaskProcessing, json!({"task_id": task.task_id})));
        self.analyze(task, node).await
    }

    async fn analyze(&self, task: Task, node: Node) -> AiOrgResult<()> {
        let children = self.store.get_child_nodes(node.node_id).await?;
        if children.is_empty() {
            return self.execute_directly(task, node).await;
        }

        let subs: Vec<SubordinateSummary> = children
            .iter()
            .map(|c| SubordinateSummary { role_name: &c.role_name, role_type: node_type_label(c.role_type), description: c.description.as_deref() })
            .collect();
        let (prompt, system) = self.prompts.analyze(&task, &node, &subs);
        let raw = self
            .call_llm(system, prompt, self.exec_config.analyze_temperature, self.exec_config.analyze_max_tokens)
            .await;
        let outcome = match raw {
            Some(text) => parse_analyze_response(&text),
            None => degraded_analyze_outcome(),
        };

        if !outcome.needs_delegation {
            if let Some(direct) = outcome.direct_response.filter(|v| !v.is_null()) {
                return self.finalize_outcome(task, node, direct, ResponseType::Analysis).await;
            }
            return self.execute_directly(task, node).await;
        }

        let raw_plan = outcome.delegation_plan.unwrap_or_else(|| json!({}));
        let plan = resolve_delegation_plan(&raw_plan, &children, node.node_id, &task);
        if plan.subtasks.is_empty() {
            return self.execute_directly(task, node).await;
        }

        let hitl = node.hitl_config();
        if hitl.enabled && hitl.review_delegation {
            let plan_value = serde_json::to_value(&plan).unwrap_or_else(|_| json!({}));
            self.hitl.queue_for_review(&node, &task, HitlReviewType::DelegationReview, Some(plan_value.clone())).await?;
            let mut context = task.context.clone();
            context["hitl_suspended"] = json!(true);
            context["pending_plan"] = plan_value;
            self.store.set_task_context(task.task_id, context).await?;
            self.store.try_transition_status(task.task_id, task.status, TaskStatus::Waiting).await?;
            return Ok(());
        }

        self.delegate(task, node, plan).await
    }

    async fn execute_directly(&self, task: Task, node: Node) -> AiOrgResult<()> {
        let (prompt, system) = self.prompts.execute(&task, &node);
        let raw = self
            .call_llm(system, prompt, self.exec_config.execute_temperature, self.exec_config.execute_max_tokens)
            .await;
        let content = match raw {
            Some(text) => parse_llm_response(&text),
            None => minimal_synthesis(&[]),
        };
        self.finalize_outcome(task, node, content, ResponseType::Analysis).await
    }

    async fn delegate(&self, task: Task, node: Node, plan: DelegationPlan) -> AiOrgResult<()> {
        let plan_value = serde_json::to_value(&plan).unwrap_or_else(|_| json!({}));
        self.store.create_response(task.task_id, node.node_id, ResponseType::DelegationPlan, plan_value, None, None).await?;
        self.events.publish(task.org_id, AiOrgEvent::new(AiOrgEventType::TaskDelegated, json!({"task_id": task.task_id})));
        let _ = self
            .store
            .write_event_log(task.org_id, "TASK_DELEGATED", Some(node.node_id), None, Some(task.task_id), json!({"subtask_count": plan.subtasks.len()}))
            .await;

        match plan.strategy {
            DelegationStrategy::Parallel => {
                for sub in &plan.subtasks {
                    self.store
                        .create_task(task.org_id, Some(task.task_id), sub.assigned_to, &sub.title, &sub.description, child_input(&task, sub), sub.priority)
                        .await?;
                }
                self.store.set_task_delegation(task.task_id, DelegationStrategy::Parallel, plan.subtasks.len() as i32).await?;
                self.store.set_task_waiting(task.task_id).await?;
            }
            DelegationStrategy::Sequential => {
                let mut remaining = plan.subtasks.clone();
                let first = remaining.remove(0);
                self.store
                    .create_task(task.org_id, Some(task.task_id), first.assigned_to, &first.title, &first.description, child_input(&task, &first), first.priority)
                    .await?;
                let mut context = task.context.clone();
                context["pending_subtasks"] = serde_json::to_value(&remaining).unwrap_or_else(|_| json!([]));
                self.store.set_task_context(task.task_id, context).await?;
                self.store.set_task_delegation(task.task_id, DelegationStrategy::Sequential, plan.subtasks.len() as i32).await?;
                self.store.set_task_waiting(task.task_id).await?;
            }
        }
        Ok(())
    }

    async fn aggregate(&self, task: Task) -> AiOrgResult<()> {
        if !self.store.try_transition_status(task.task_id, TaskStatus::Waiting, TaskStatus::InProgress).await? {
            return Ok(());
        }
        let node = self.store.get_node(task.assigned_node_id).await?.ok_or(AiOrgError::NotFound { kind: "node", id: task.assigned_node_id })?;
        let subtasks = self.store.get_subtasks(task.task_id).await?;

        let mut subordinate_responses = Vec::with_capacity(subtasks.len());
        let mut failed_count = 0usize;
        for sub in &subtasks {
            if sub.status == TaskStatus::Failed {
                failed_count += 1;
                subordinate_responses.push((sub.title.clone(), json!({"failed": true, "error": sub.error_message})));
                continue;
            }
            let responses = self.store.get_task_responses(sub.task_id).await?;
            let outcome = authoritative_response(&responses);
            let content = outcome.map(|r| r.content.clone()).unwrap_or_else(|| sub.output_data.clone().unwrap_or(json!({})));
            subordinate_responses.push((sub.title.clone(), content));
        }

        let (prompt, system) = self.prompts.aggregate(&task, &node, &subordinate_responses);
        let raw = self
            .call_llm(system, prompt, self.exec_config.aggregate_temperature, self.exec_config.aggregate_max_tokens)
            .await;
        let mut content = match raw {
            Some(text) => parse_llm_response(&text),
            None => minimal_synthesis(&subordinate_responses),
        };
        if failed_count > 0 {
            if let Value::Object(ref mut map) = content {
                map.insert("partial_failure".to_string(), json!(format!("{failed_count} of {} subtasks failed", subtasks.len())));
            }
        }

        self.finalize_outcome(task, node, content, ResponseType::Summary).await
    }

    async fn finalize_outcome(&self, task: Task, node: Node, content: Value, response_type: ResponseType) -> AiOrgResult<()> {
        let response = self
            .store
            .create_response(
                task.task_id,
                node.node_id,
                response_type,
                content.clone(),
                content.get("summary").and_then(Value::as_str),
                content.get("reasoning").and_then(Value::as_str),
            )
            .await?;

        let hitl = node.hitl_config();
        if hitl.enabled && hitl.approval_required {
            self.hitl.queue_for_review(&node, &task, HitlReviewType::ResponseApproval, Some(response.content.clone())).await?;
            let mut context = task.context.clone();
            context["hitl_suspended"] = json!(true);
            context["pending_response_id"] = json!(response.response_id);
            self.store.set_task_context(task.task_id, context).await?;
            self.store.try_transition_status(task.task_id, task.status, TaskStatus::Waiting).await?;
            return Ok(());
        }

        self.finalize(task.task_id, response.content).await
    }

    /// completed/failed form a recursive cycle through `child_complete` ->
    /// `aggregate`/`finalize_outcome` -> `finalize`/`fail_task` as a result
    /// propagates up a delegation tree. Boxing the future here (and in
    /// `fail_task`) gives that cycle a fixed size; nothing else in the
    /// engine needs it.
    fn finalize<'a>(&'a self, task_id: Uuid, content: Value) -> BoxedFuture<'a, AiOrgResult<()>> {
        Box::pin(async move {
            let task = self.store.get_task(task_id).await?.ok_or(AiOrgError::NotFound { kind: "task", id: task_id })?;
            if task.status.is_terminal() {
                return Ok(());
            }
            self.store.set_task_output(task_id, content.clone()).await?;
            self.store.try_transition_status(task_id, task.status, TaskStatus::Completed).await?;
            self.store.set_task_context(task_id, json!({})).await?;
            self.events.publish(task.org_id, AiOrgEvent::new(AiOrgEventType::TaskCompleted, json!({"task_id": task_id})));
            let _ = self
                .store
                .write_event_log(task.org_id, "TASK_COMPLETED", None, Some(task.assigned_node_id), Some(task_id), json!({"summary": content.get("summary")}))
                .await;

            if let Some(_parent_id) = task.parent_task_id {
                let completed = Task { status: TaskStatus::Completed, ..task };
                self.child_complete(&completed).await?;
            } else if let Some(node) = self.store.get_node(task.assigned_node_id).await? {
                let overdue = task.is_overdue(Utc::now());
                let summary = content.get("summary").and_then(Value::as_str).unwrap_or("completed").to_string();
                if let Err(err) = self
                    .notifier
                    .notify_task_complete(&node, TaskCompletionNotice { task_id, task_title: &task.title, summary: &summary, overdue })
                    .await
                {
                    tracing::warn!(%task_id, error = %err, "task completion notification failed");
                    self.events.publish(task.org_id, AiOrgEvent::new(AiOrgEventType::NotifyFailed, json!({"task_id": task_id})));
                }
            }
            Ok(())
        })
    }

    /// The spec's explicit "fail" transition (§4.4 edge 7), exposed as a
    /// public method so store faults encountered elsewhere in the service
    /// layer — and tests simulating one — can drive it directly rather
    /// than needing a genuine database failure to exercise the path.
    pub fn fail_task<'a>(&'a self, task_id: Uuid, reason: &'a str) -> BoxedFuture<'a, AiOrgResult<()>> {
        Box::pin(async move {
            let task = self.store.get_task(task_id).await?.ok_or(AiOrgError::NotFound { kind: "task", id: task_id })?;
            if task.status.is_terminal() {
                return Ok(());
            }
            self.store.set_task_failed_with_status(task_id, TaskStatus::Failed, Some(reason)).await?;
            self.store.set_task_context(task_id, json!({})).await?;
            self.events.publish(task.org_id, AiOrgEvent::new(AiOrgEventType::TaskFailed, json!({"task_id": task_id, "reason": reason})));
            let _ = self
                .store
                .write_event_log(task.org_id, "TASK_FAILED", None, Some(task.assigned_node_id), Some(task_id), json!({"error_message": reason}))
                .await;

            if task.parent_task_id.is_some() {
                let failed = Task { status: TaskStatus::Failed, error_message: Some(reason.to_string()), ..task };
                self.child_complete(&failed).await?;
            }
            Ok(())
        })
    }

    async fn child_complete(&self, child: &Task) -> AiOrgResult<()> {
        let Some(parent_id) = child.parent_task_id else { return Ok(()) };
        let _guard = self.parent_locks.lock(parent_id).await;

        if !self.store.record_child_complete(parent_id, child.task_id).await? {
            return Ok(());
        }
        let Some(parent) = self.store.get_task(parent_id).await? else { return Ok(()) };
        if parent.status.is_terminal() {
            return Ok(());
        }

        if parent.delegation_strategy == Some(DelegationStrategy::Sequential) {
            if let Some(next) = self.take_next_planned_subtask(&parent).await? {
                self.store
                    .create_task(parent.org_id, Some(parent.task_id), next.assigned_to, &next.title, &next.description, child_input(&parent, &next), next.priority)
                    .await?;
            }
        }

        if parent.expected_responses > 0 && parent.received_responses >= parent.expected_responses {
            self.aggregate(parent).await?;
        }
        Ok(())
    }

    async fn take_next_planned_subtask(&self, parent: &Task) -> AiOrgResult<Option<PlannedSubtask>> {
        let mut pending: Vec<Value> = parent
            .context
            .get("pending_subtasks")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if pending.is_empty() {
            return Ok(None);
        }
        let next_value = pending.remove(0);
        let next: PlannedSubtask =
            serde_json::from_value(next_value).map_err(|e| AiOrgError::invariant(format!("corrupt pending_subtasks entry: {e}")))?;

        let mut context = parent.context.clone();
        context["pending_subtasks"] = Value::Array(pending);
        self.store.set_task_context(parent.task_id, context).await?;
        Ok(Some(next))
    }

    /// Called by the service after a HITL decision resolves, never by the
    /// engine itself. Dispatches on the gate the item was queued for.
    pub async fn resume_after_hitl(&self, resolution: HitlResolution) -> AiOrgResult<()> {
        if matches!(resolution.outcome, HitlOutcome::TimedOut) {
            return Ok(());
        }
        let item = resolution.item;
        let Some(task) = self.store.get_task(item.task_id).await? else { return Ok(()) };
        let Some(node) = self.store.get_node(item.node_id).await? else { return Ok(()) };

        match item.review_type {
            HitlReviewType::TaskReceived => match resolution.outcome {
                HitlOutcome::Rejected { reason } => self.fail_task(task.task_id, &format!("HITL rejected: {reason}")).await,
                _ => {
                    self.store.set_task_context(task.task_id, json!({})).await?;
                    self.analyze(task, node).await
                }
            },
            HitlReviewType::DelegationReview => match resolution.outcome {
                HitlOutcome::Rejected { .. } => {
                    self.store.set_task_context(task.task_id, json!({})).await?;
                    self.store.try_transition_status(task.task_id, task.status, TaskStatus::InProgress).await?;
                    self.execute_directly(task, node).await
                }
                HitlOutcome::Overridden { content } => {
                    let children = self.store.get_child_nodes(node.node_id).await?;
                    let plan = resolve_delegation_plan(&content, &children, node.node_id, &task);
                    self.store.set_task_context(task.task_id, json!({})).await?;
                    self.store.try_transition_status(task.task_id, task.status, TaskStatus::InProgress).await?;
                    self.delegate(task, node, plan).await
                }
                _ => {
                    let plan_value = task.context.get("pending_plan").cloned().unwrap_or_else(|| json!({}));
                    let children = self.store.get_child_nodes(node.node_id).await?;
                    let plan = resolve_delegation_plan(&plan_value, &children, node.node_id, &task);
                    self.store.set_task_context(task.task_id, json!({})).await?;
                    self.store.try_transition_status(task.task_id, task.status, TaskStatus::InProgress).await?;
                    self.delegate(task, node, plan).await
                }
            },
            HitlReviewType::ResponseApproval => match resolution.outcome {
                HitlOutcome::Rejected { reason } => self.fail_task(task.task_id, &format!("HITL rejected: {reason}")).await,
                HitlOutcome::Overridden { content } => {
                    let original = item.content.clone().unwrap_or_else(|| json!({}));
                    self.store
                        .create_human_override_response(task.task_id, node.node_id, content.clone(), original, "HITL override", &resolution.user)
                        .await?;
                    self.store.set_task_context(task.task_id, json!({})).await?;
                    self.finalize(task.task_id, content).await
                }
                _ => {
                    let content = item.content.clone().unwrap_or_else(|| json!({}));
                    self.store.set_task_context(task.task_id, json!({})).await?;
                    self.finalize(task.task_id, content).await
                }
            },
        }
    }
}

fn node_type_label(role_type: NodeType) -> &'static str {
    match role_type {
        NodeType::Executive => "executive",
        NodeType::Manager => "manager",
        NodeType::Analyst => "analyst",
        NodeType::Coordinator => "coordinator",
    }
}

fn child_input(parent: &Task, sub: &PlannedSubtask) -> Value {
    json!({
        "parent_task_id": parent.task_id,
        "instructions": sub.instructions,
        "parent_input": parent.input_data,
    })
}

/// Used when the LLM is unavailable during analyze and the node has
/// subordinates: defer to the default plan built in `resolve_delegation_plan`.
fn degraded_analyze_outcome() -> crate::prompts::AnalyzeOutcome {
    crate::prompts::AnalyzeOutcome {
        needs_delegation: true,
        reasoning: Some("llm unavailable: using default delegation plan".to_string()),
        delegation_plan: None,
        direct_response: None,
    }
}

/// Minimal synthesis fallback for execute/aggregate when the LLM call
/// fails outright (as opposed to returning unparseable text, which
/// `parse_llm_response` already degrades on its own).
fn minimal_synthesis(subordinate_responses: &[(String, Value)]) -> Value {
    if subordinate_responses.is_empty() {
        json!({"summary": "execution unavailable", "confidence_level": "low"})
    } else {
        json!({
            "summary": format!("synthesis unavailable; {} subordinate result(s) recorded as-is", subordinate_responses.len()),
            "confidence_level": "low",
        })
    }
}

fn authoritative_response(responses: &[aiorg_shared::database::Response]) -> Option<&aiorg_shared::database::Response> {
    responses
        .iter()
        .rev()
        .find(|r| r.response_type == ResponseType::HumanOverride)
        .or_else(|| responses.iter().rev().find(|r| r.response_type != ResponseType::DelegationPlan))
}

fn default_plan(children: &[Node], task: &Task) -> DelegationPlan {
    DelegationPlan {
        strategy: DelegationStrategy::Parallel,
        subtasks: children
            .iter()
            .map(|c| PlannedSubtask {
                title: format!("{}: {}", c.role_name, task.title),
                description: task.description.clone(),
                assigned_to: c.node_id,
                priority: task.priority,
                instructions: None,
            })
            .collect(),
    }
}

fn resolve_assigned_to(raw: &str, children: &[Node]) -> Option<Uuid> {
    if let Ok(id) = Uuid::parse_str(raw) {
        if children.iter().any(|c| c.node_id == id) {
            return Some(id);
        }
    }
    if let Some(c) = children.iter().find(|c| c.role_name.eq_ignore_ascii_case(raw)) {
        return Some(c.node_id);
    }
    children.first().map(|c| c.node_id)
}

fn parse_priority(raw: &str) -> Option<TaskPriority> {
    match raw.to_ascii_lowercase().as_str() {
        "low" => Some(TaskPriority::Low),
        "medium" => Some(TaskPriority::Medium),
        "high" => Some(TaskPriority::High),
        "urgent" => Some(TaskPriority::Urgent),
        _ => None,
    }
}

/// Resolves a raw LLM-produced (or human-overridden) delegation plan
/// against the node's actual direct children: `assigned_to` is tried as a
/// UUID, then a case-insensitive role name match, then falls back to the
/// first direct child. A resolved assignment equal to `node_id` itself is
/// dropped (self-delegation, §4.4 edge case). An empty result with
/// children present falls back to the default plan rather than coercing
/// straight to direct execution, since the LLM's intent to delegate is
/// still honored even though its specific plan didn't parse.
fn resolve_delegation_plan(raw: &Value, children: &[Node], node_id: Uuid, task: &Task) -> DelegationPlan {
    let strategy = match raw.get("strategy").and_then(Value::as_str) {
        Some("sequential") => DelegationStrategy::Sequential,
        _ => DelegationStrategy::Parallel,
    };
    let raw_subtasks = raw.get("subtasks").and_then(Value::as_array).cloned().unwrap_or_default();

    let mut subtasks = Vec::new();
    for item in raw_subtasks {
        let assigned_raw = item.get("assigned_to").and_then(Value::as_str).unwrap_or("");
        let Some(assigned_to) = resolve_assigned_to(assigned_raw, children) else { continue };
        if assigned_to == node_id {
            continue;
        }
        let title = item.get("title").and_then(Value::as_str).unwrap_or(&task.title).to_string();
        let description = item.get("description").and_then(Value::as_str).unwrap_or(&task.description).to_string();
        let instructions = item.get("instructions").and_then(Value::as_str).map(str::to_string);
        let priority = item.get("priority").and_then(Value::as_str).and_then(parse_priority).unwrap_or(task.priority);
        subtasks.push(PlannedSubtask { title, description, assigned_to, priority, instructions });
    }

    if subtasks.is_empty() && !children.is_empty() {
        return default_plan(children, task);
    }

    DelegationPlan { strategy, subtasks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiorg_shared::database::NodeStatus;
    use chrono::Utc;

    fn sample_node(id: Uuid, role_name: &str) -> Node {
        Node {
            node_id: id,
            org_id: Uuid::new_v4(),
            parent_node_id: Some(Uuid::new_v4()),
            role_name: role_name.to_string(),
            role_type: NodeType::Analyst,
            description: None,
            agent_config: json!({}),
            human_name: "Human".to_string(),
            human_email: "h@example.com".to_string(),
            human_chat_id_teams: None,
            human_chat_id_slack: None,
            hitl_enabled: false,
            hitl_approval_required: false,
            hitl_review_delegation: false,
            hitl_timeout_hours: 24.0,
            hitl_auto_proceed: false,
            notification_channels: json!([]),
            position_x: 0.0,
            position_y: 0.0,
            status: NodeStatus::Active,
            current_task_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_task() -> Task {
        Task {
            task_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            parent_task_id: None,
            assigned_node_id: Uuid::new_v4(),
            title: "Root task".to_string(),
            description: "do the thing".to_string(),
            input_data: json!({}),
            output_data: None,
            context: json!({}),
            status: TaskStatus::InProgress,
            delegation_strategy: None,
            expected_responses: 0,
            received_responses: 0,
            priority: TaskPriority::Medium,
            deadline: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            retry_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn resolve_assigned_to_prefers_uuid_match() {
        let n2 = sample_node(Uuid::new_v4(), "N2");
        let n3 = sample_node(Uuid::new_v4(), "N3");
        let children = vec![n2.clone(), n3.clone()];
        assert_eq!(resolve_assigned_to(&n3.node_id.to_string(), &children), Some(n3.node_id));
    }

    #[test]
    fn resolve_assigned_to_falls_back_to_role_name_then_first_child() {
        let n2 = sample_node(Uuid::new_v4(), "Analyst One");
        let n3 = sample_node(Uuid::new_v4(), "Analyst Two");
        let children = vec![n2.clone(), n3.clone()];
        assert_eq!(resolve_assigned_to("analyst two", &children), Some(n3.node_id));
        assert_eq!(resolve_assigned_to("nobody-known", &children), Some(n2.node_id));
    }

    #[test]
    fn resolve_delegation_plan_skips_self_assignment() {
        let node_id = Uuid::new_v4();
        let n2 = sample_node(Uuid::new_v4(), "N2");
        let children = vec![n2.clone()];
        let task = sample_task();
        let raw = json!({
            "strategy": "parallel",
            "subtasks": [
                {"title": "self", "description": "x", "assigned_to": node_id.to_string()},
                {"title": "to n2", "description": "y", "assigned_to": n2.node_id.to_string()},
            ],
        });
        let plan = resolve_delegation_plan(&raw, &children, node_id, &task);
        assert_eq!(plan.subtasks.len(), 1);
        assert_eq!(plan.subtasks[0].assigned_to, n2.node_id);
    }

    #[test]
    fn resolve_delegation_plan_empty_with_children_falls_back_to_default() {
        let node_id = Uuid::new_v4();
        let n2 = sample_node(Uuid::new_v4(), "N2");
        let children = vec![n2.clone()];
        let task = sample_task();
        let raw = json!({"strategy": "parallel", "subtasks": []});
        let plan = resolve_delegation_plan(&raw, &children, node_id, &task);
        assert_eq!(plan.subtasks.len(), 1);
        assert_eq!(plan.subtasks[0].assigned_to, n2.node_id);
    }

    #[test]
    fn default_plan_has_one_subtask_per_child() {
        let n2 = sample_node(Uuid::new_v4(), "N2");
        let n3 = sample_node(Uuid::new_v4(), "N3");
        let children = vec![n2, n3];
        let task = sample_task();
        let plan = default_plan(&children, &task);
        assert_eq!(plan.subtasks.len(), 2);
        assert_eq!(plan.strategy, DelegationStrategy::Parallel);
    }

    #[test]
    fn minimal_synthesis_reports_low_confidence() {
        let value = minimal_synthesis(&[]);
        assert_eq!(value["confidence_level"], json!("low"));
    }
}
