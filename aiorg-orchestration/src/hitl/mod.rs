//! Human-in-the-loop arbitration (C5): queueing, decisions, timeouts, and
//! the audit trail. A `HitlManager` never calls back into the Task Engine
//! directly — it has no handle to one — so it cannot form an `Arc` cycle
//! with it. Instead every decision method returns a [`HitlResolution`]
//! describing what happened; the `AiOrgService` facade, which holds both
//! the engine and this manager, is the one that calls
//! `TaskEngine::resume_after_hitl` with the result.

use aiorg_shared::database::{
    HitlActionType, HitlQueueItem, HitlQueueStatus, HitlReviewType, Node, NodeStatus, Task,
};
use aiorg_shared::event_bus::{AiOrgEvent, AiOrgEventType};
use aiorg_shared::{AiOrgError, AiOrgResult};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::locks::KeyedLocks;
use crate::notifier::{HitlPendingNotice, Notifier};
use crate::store::Store;

/// What a resolved queue item means for the suspended task. `TimedOut`
/// covers the non-`auto_proceed` timeout branch of §4.5: the item is
/// moved to a terminal `timeout` status and audited, but the spec gives
/// the engine nothing to resume with in that case, so the task stays
/// suspended until a human acts through some out-of-core channel. The
/// service filters this variant out before calling the engine.
#[derive(Debug, Clone)]
pub enum HitlOutcome {
    Approved { content: Option<Value> },
    Rejected { reason: String },
    Overridden { content: Value },
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct HitlResolution {
    pub item: HitlQueueItem,
    pub outcome: HitlOutcome,
    pub user: String,
}

pub struct HitlManager {
    store: Arc<Store>,
    events: Arc<aiorg_shared::EventBus>,
    notifier: Arc<dyn Notifier>,
    item_locks: KeyedLocks,
}

impl HitlManager {
    pub fn new(store: Arc<Store>, events: Arc<aiorg_shared::EventBus>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            events,
            notifier,
            item_locks: KeyedLocks::new(),
        }
    }

    fn expires_at(node: &Node, now: DateTime<Utc>) -> DateTime<Utc> {
        let millis = (node.hitl_timeout_hours.max(0.0) * 3_600_000.0) as i64;
        now + chrono::Duration::milliseconds(millis)
    }

    /// Enqueues a review item and fires the pending-review notification.
    /// Notification failure is logged and never propagated (§4.6).
    pub async fn queue_for_review(
        &self,
        node: &Node,
        task: &Task,
        review_type: HitlReviewType,
        content: Option<Value>,
    ) -> AiOrgResult<HitlQueueItem> {
        let expires_at = Self::expires_at(node, Utc::now());
        let item = self
            .store
            .create_hitl_queue_item(task.org_id, node.node_id, task.task_id, review_type, content.clone(), expires_at)
            .await?;

        self.events.publish(
            task.org_id,
            AiOrgEvent::new(
                AiOrgEventType::HitlRequired,
                json!({"item_id": item.item_id, "task_id": task.task_id, "node_id": node.node_id, "review_type": review_type}),
            ),
        );
        let _ = self
            .store
            .write_event_log(task.org_id, "HITL_REQUIRED", Some(node.node_id), None, Some(task.task_id), json!({"item_id": item.item_id}))
            .await;

        if let Err(err) = self
            .notifier
            .notify_hitl_pending(node, HitlPendingNotice { item_id: item.item_id, role_name: &node.role_name, task_title: &task.title })
            .await
        {
            tracing::warn!(item_id = %item.item_id, error = %err, "hitl pending notification failed");
            self.events.publish(task.org_id, AiOrgEvent::new(AiOrgEventType::NotifyFailed, json!({"item_id": item.item_id})));
        }

        Ok(item)
    }

    async fn load_item(&self, item_id: Uuid) -> AiOrgResult<HitlQueueItem> {
        self.store
            .get_hitl_queue_item(item_id)
            .await?
            .ok_or(AiOrgError::NotFound { kind: "hitl_queue_item", id: item_id })
    }

    /// item.pending -> approved. The original content (delegation plan or
    /// candidate response) flows through unchanged.
    pub async fn approve(&self, item_id: Uuid, user: &str, comment: Option<&str>) -> AiOrgResult<HitlResolution> {
        let _guard = self.item_locks.lock(item_id).await;
        let item = self.load_item(item_id).await?;
        if !self.store.resolve_hitl_queue_item(item_id, HitlQueueStatus::Approved).await? {
            return Err(AiOrgError::HitlNotPending { item_id });
        }
        self.store
            .create_hitl_action(item.org_id, item.node_id, Some(item.task_id), None, user, HitlActionType::Approve, item.content.clone(), None, None, comment)
            .await?;
        self.events.publish(item.org_id, AiOrgEvent::new(AiOrgEventType::HitlApproved, json!({"item_id": item_id})));
        Ok(HitlResolution { item, outcome: HitlOutcome::Approved { content: None }, user: user.to_string() })
    }

    /// item.pending -> rejected. Engine-side fallout depends on the gate
    /// the item was queued for and is decided by `TaskEngine::resume_after_hitl`.
    pub async fn reject(&self, item_id: Uuid, user: &str, reason: &str) -> AiOrgResult<HitlResolution> {
        let _guard = self.item_locks.lock(item_id).await;
        let item = self.load_item(item_id).await?;
        if !self.store.resolve_hitl_queue_item(item_id, HitlQueueStatus::Rejected).await? {
            return Err(AiOrgError::HitlNotPending { item_id });
        }
        self.store
            .create_hitl_action(item.org_id, item.node_id, Some(item.task_id), None, user, HitlActionType::Reject, item.content.clone(), None, Some(reason), None)
            .await?;
        self.events.publish(item.org_id, AiOrgEvent::new(AiOrgEventType::HitlRejected, json!({"item_id": item_id, "reason": reason})));
        Ok(HitlResolution { item, outcome: HitlOutcome::Rejected { reason: reason.to_string() }, user: user.to_string() })
    }

    /// item.pending -> overridden. `new_content` replaces the plan (for
    /// `delegation_review`) or becomes the promoted outcome with an
    /// appended `human_override` Response (for `response_approval`); the
    /// distinction is made by the engine, not here.
    pub async fn override_decision(&self, item_id: Uuid, user: &str, new_content: Value, reason: &str) -> AiOrgResult<HitlResolution> {
        let _guard = self.item_locks.lock(item_id).await;
        let item = self.load_item(item_id).await?;
        if !self.store.resolve_hitl_queue_item(item_id, HitlQueueStatus::Overridden).await? {
            return Err(AiOrgError::HitlNotPending { item_id });
        }
        self.store
            .create_hitl_action(
                item.org_id,
                item.node_id,
                Some(item.task_id),
                None,
                user,
                HitlActionType::Override,
                item.content.clone(),
                Some(new_content.clone()),
                Some(reason),
                None,
            )
            .await?;
        self.events.publish(item.org_id, AiOrgEvent::new(AiOrgEventType::HitlOverridden, json!({"item_id": item_id})));
        Ok(HitlResolution { item, outcome: HitlOutcome::Overridden { content: new_content }, user: user.to_string() })
    }

    /// Non-terminal: appends an audit message without affecting flow.
    pub async fn add_message(&self, item_id: Uuid, user: &str, message: &str) -> AiOrgResult<()> {
        let _guard = self.item_locks.lock(item_id).await;
        let item = self.load_item(item_id).await?;
        self.store
            .create_hitl_action(item.org_id, item.node_id, Some(item.task_id), None, user, HitlActionType::Message, None, None, None, Some(message))
            .await?;
        Ok(())
    }

    pub async fn pause_node(&self, node_id: Uuid, user: &str, reason: Option<&str>) -> AiOrgResult<()> {
        let node = self.store.get_node(node_id).await?.ok_or(AiOrgError::NotFound { kind: "node", id: node_id })?;
        self.store.set_node_status(node_id, NodeStatus::Paused).await?;
        self.store
            .create_hitl_action(node.org_id, node_id, None, None, user, HitlActionType::Pause, None, None, reason, None)
            .await?;
        self.events.publish(node.org_id, AiOrgEvent::new(AiOrgEventType::NodePaused, json!({"node_id": node_id})));
        Ok(())
    }

    pub async fn resume_node(&self, node_id: Uuid, user: &str) -> AiOrgResult<()> {
        let node = self.store.get_node(node_id).await?.ok_or(AiOrgError::NotFound { kind: "node", id: node_id })?;
        self.store.set_node_status(node_id, NodeStatus::Active).await?;
        self.store
            .create_hitl_action(node.org_id, node_id, None, None, user, HitlActionType::Resume, None, None, None, None)
            .await?;
        self.events.publish(node.org_id, AiOrgEvent::new(AiOrgEventType::NodeResumed, json!({"node_id": node_id})));
        Ok(())
    }

    /// Scans items expired as of `now`. `auto_proceed` nodes get an
    /// `approve(user="system_timeout")`; everything else moves to
    /// `timeout` with an audit row and no resume signal. Returns one
    /// resolution per item actually won by this call (a concurrent sweep
    /// or a human decision landing first means this call resolved
    /// nothing for that item).
    pub async fn check_timeouts(&self, now: DateTime<Utc>) -> AiOrgResult<Vec<HitlResolution>> {
        let expired = self.store.get_expired_hitl(now).await?;
        let mut resolutions = Vec::with_capacity(expired.len());
        for item in expired {
            let _guard = self.item_locks.lock(item.item_id).await;
            let Some(node) = self.store.get_node(item.node_id).await? else { continue };

            if node.hitl_auto_proceed {
                if !self.store.resolve_hitl_queue_item(item.item_id, HitlQueueStatus::Approved).await? {
                    continue;
                }
                self.store
                    .create_hitl_action(
                        item.org_id,
                        item.node_id,
                        Some(item.task_id),
                        None,
                        "system_timeout",
                        HitlActionType::Approve,
                        item.content.clone(),
                        None,
                        Some("auto-approved on timeout"),
                        None,
                    )
                    .await?;
                self.events.publish(item.org_id, AiOrgEvent::new(AiOrgEventType::HitlApproved, json!({"item_id": item.item_id})));
                resolutions.push(HitlResolution { item, outcome: HitlOutcome::Approved { content: None }, user: "system_timeout".to_string() });
            } else {
                if !self.store.resolve_hitl_queue_item(item.item_id, HitlQueueStatus::Timeout).await? {
                    continue;
                }
                self.store
                    .create_hitl_action(item.org_id, item.node_id, Some(item.task_id), None, "system_timeout", HitlActionType::Timeout, item.content.clone(), None, None, None)
                    .await?;
                self.events.publish(item.org_id, AiOrgEvent::new(AiOrgEventType::HitlTimeout, json!({"item_id": item.item_id})));
                resolutions.push(HitlResolution { item, outcome: HitlOutcome::TimedOut, user: "system_timeout".to_string() });
            }
        }
        Ok(resolutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_uses_node_timeout_hours() {
        let node = sample_node(2.0);
        let now = Utc::now();
        let expires = HitlManager::expires_at(&node, now);
        assert_eq!((expires - now).num_minutes(), 120);
    }

    fn sample_node(timeout_hours: f64) -> Node {
        Node {
            node_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            parent_node_id: None,
            role_name: "CEO".to_string(),
            role_type: aiorg_shared::database::NodeType::Executive,
            description: None,
            agent_config: json!({}),
            human_name: "Alex".to_string(),
            human_email: "alex@example.com".to_string(),
            human_chat_id_teams: None,
            human_chat_id_slack: None,
            hitl_enabled: true,
            hitl_approval_required: true,
            hitl_review_delegation: false,
            hitl_timeout_hours: timeout_hours,
            hitl_auto_proceed: false,
            notification_channels: json!(["email"]),
            position_x: 0.0,
            position_y: 0.0,
            status: NodeStatus::Active,
            current_task_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
