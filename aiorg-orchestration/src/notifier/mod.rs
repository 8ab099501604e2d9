//! Best-effort outbound notifications (C6). Failures are logged, never
//! propagated — the caller records a `NOTIFY_FAILED` event and moves on.

use aiorg_shared::database::Node;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TaskCompletionNotice<'a> {
    pub task_id: Uuid,
    pub task_title: &'a str,
    pub summary: &'a str,
    pub overdue: bool,
}

#[derive(Debug, Clone)]
pub struct HitlPendingNotice<'a> {
    pub item_id: Uuid,
    pub role_name: &'a str,
    pub task_title: &'a str,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_task_complete(&self, node: &Node, notice: TaskCompletionNotice<'_>) -> Result<(), String>;
    async fn notify_hitl_pending(&self, node: &Node, notice: HitlPendingNotice<'_>) -> Result<(), String>;
}

/// Logs each notification through `tracing` rather than reaching an actual
/// email/chat backend — the channel list on the Node still gates which
/// "sends" are attempted, matching the contract, but delivery is a log
/// line. Swap in a real channel-backed Notifier without touching callers.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_task_complete(&self, node: &Node, notice: TaskCompletionNotice<'_>) -> Result<(), String> {
        for channel in node.notification_channels() {
            tracing::info!(
                channel,
                node_id = %node.node_id,
                task_id = %notice.task_id,
                overdue = notice.overdue,
                "root task completed: \"{}\" — {}",
                notice.task_title,
                notice.summary,
            );
        }
        Ok(())
    }

    async fn notify_hitl_pending(&self, node: &Node, notice: HitlPendingNotice<'_>) -> Result<(), String> {
        for channel in node.notification_channels() {
            tracing::info!(
                channel,
                node_id = %node.node_id,
                item_id = %notice.item_id,
                "HITL review pending for {} on \"{}\"",
                notice.role_name,
                notice.task_title,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiorg_shared::database::{NodeStatus, NodeType};
    use chrono::Utc;

    fn sample_node() -> Node {
        Node {
            node_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            parent_node_id: None,
            role_name: "CEO".to_string(),
            role_type: NodeType::Executive,
            description: None,
            agent_config: serde_json::json!({}),
            human_name: "Alex".to_string(),
            human_email: "alex@example.com".to_string(),
            human_chat_id_teams: None,
            human_chat_id_slack: None,
            hitl_enabled: false,
            hitl_approval_required: false,
            hitl_review_delegation: false,
            hitl_timeout_hours: 24.0,
            hitl_auto_proceed: false,
            notification_channels: serde_json::json!(["email"]),
            position_x: 0.0,
            position_y: 0.0,
            status: NodeStatus::Active,
            current_task_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn notify_task_complete_succeeds() {
        let notifier = LoggingNotifier;
        let node = sample_node();
        let result = notifier
            .notify_task_complete(
                &node,
                TaskCompletionNotice {
                    task_id: Uuid::new_v4(),
                    task_title: "Quarterly review",
                    summary: "done",
                    overdue: false,
                },
            )
            .await;
        assert!(result.is_ok());
    }
}
