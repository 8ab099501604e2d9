//! Entities from §3 of the specification. Each has a stable `Uuid` id.
//! JSON-typed fields (`config`, `input_data`, `output_data`, `context`,
//! `content`, `payload`) stay as opaque `serde_json::Value` — validated at
//! the boundary (submission, LLM parse) rather than given a closed shape,
//! per the "keep the blobs opaque but strongly type the entities" design
//! note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------
// Org
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrgStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Org {
    pub org_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: OrgStatus,
    pub config: serde_json::Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Executive,
    Manager,
    Analyst,
    Coordinator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanMirror {
    pub name: String,
    pub email: String,
    pub chat_id_teams: Option<String>,
    pub chat_id_slack: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlConfig {
    pub enabled: bool,
    pub approval_required: bool,
    pub review_delegation: bool,
    pub timeout_hours: f64,
    pub auto_proceed: bool,
}

impl Default for HitlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            approval_required: false,
            review_delegation: false,
            timeout_hours: 24.0,
            auto_proceed: false,
        }
    }
}

impl HitlConfig {
    /// Whether the incoming task itself should be queued for review before
    /// admission. `enabled` alone is shared by all three checkpoints, so a
    /// node that asked for `approval_required` or `review_delegation`
    /// review downstream does not also suspend at task_received.
    pub fn wants_task_received(&self) -> bool {
        self.enabled && !self.approval_required && !self.review_delegation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationChannel {
    Email,
    Chat,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Node {
    pub node_id: Uuid,
    pub org_id: Uuid,
    pub parent_node_id: Option<Uuid>,
    pub role_name: String,
    pub role_type: NodeType,
    pub description: Option<String>,
    pub agent_config: serde_json::Value,
    pub human_name: String,
    pub human_email: String,
    pub human_chat_id_teams: Option<String>,
    pub human_chat_id_slack: Option<String>,
    pub hitl_enabled: bool,
    pub hitl_approval_required: bool,
    pub hitl_review_delegation: bool,
    pub hitl_timeout_hours: f64,
    pub hitl_auto_proceed: bool,
    pub notification_channels: serde_json::Value,
    pub position_x: f64,
    pub position_y: f64,
    pub status: NodeStatus,
    pub current_task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn human_mirror(&self) -> HumanMirror {
        HumanMirror {
            name: self.human_name.clone(),
            email: self.human_email.clone(),
            chat_id_teams: self.human_chat_id_teams.clone(),
            chat_id_slack: self.human_chat_id_slack.clone(),
        }
    }

    pub fn hitl_config(&self) -> HitlConfig {
        HitlConfig {
            enabled: self.hitl_enabled,
            approval_required: self.hitl_approval_required,
            review_delegation: self.hitl_review_delegation,
            timeout_hours: self.hitl_timeout_hours,
            auto_proceed: self.hitl_auto_proceed,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_node_id.is_none()
    }

    pub fn notification_channels(&self) -> Vec<String> {
        serde_json::from_value(self.notification_channels.clone()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Delegated,
    Waiting,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DelegationStrategy {
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub task_id: Uuid,
    pub org_id: Uuid,
    pub parent_task_id: Option<Uuid>,
    pub assigned_node_id: Uuid,
    pub title: String,
    pub description: String,
    pub input_data: serde_json::Value,
    pub output_data: Option<serde_json::Value>,
    pub context: serde_json::Value,
    pub status: TaskStatus,
    pub delegation_strategy: Option<DelegationStrategy>,
    pub expected_responses: i32,
    pub received_responses: i32,
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_root(&self) -> bool {
        self.parent_task_id.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now > d) && !self.status.is_terminal()
    }
}

// ---------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    DelegationPlan,
    Analysis,
    Summary,
    HumanOverride,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Response {
    pub response_id: Uuid,
    pub task_id: Uuid,
    pub node_id: Uuid,
    pub response_type: ResponseType,
    pub content: serde_json::Value,
    pub summary: Option<String>,
    pub reasoning: Option<String>,
    pub confidence_score: Option<f64>,
    pub quality_score: Option<f64>,
    pub is_human_modified: bool,
    pub original_ai_content: Option<serde_json::Value>,
    pub modification_reason: Option<String>,
    pub modified_by: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// HITL Action / Queue Item
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HitlActionType {
    Approve,
    Reject,
    Override,
    Message,
    Pause,
    Resume,
    View,
    /// Not in the original action vocabulary; added so `check_timeouts` has
    /// somewhere to write the audit row §4.5 requires ("writes an Action for
    /// audit") when a non-`auto_proceed` item times out without a human
    /// decision.
    Timeout,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HitlAction {
    pub action_id: Uuid,
    pub org_id: Uuid,
    pub node_id: Uuid,
    pub task_id: Option<Uuid>,
    pub response_id: Option<Uuid>,
    pub user_id: String,
    pub action_type: HitlActionType,
    pub original_content: Option<serde_json::Value>,
    pub modified_content: Option<serde_json::Value>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HitlReviewType {
    TaskReceived,
    DelegationReview,
    ResponseApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HitlQueueStatus {
    Pending,
    Approved,
    Rejected,
    Overridden,
    Timeout,
}

impl HitlQueueStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HitlQueueItem {
    pub item_id: Uuid,
    pub org_id: Uuid,
    pub node_id: Uuid,
    pub task_id: Uuid,
    pub review_type: HitlReviewType,
    pub content: Option<serde_json::Value>,
    pub status: HitlQueueStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Event Log
// ---------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventLog {
    pub event_id: Uuid,
    pub org_id: Uuid,
    pub event_type: String,
    pub source_node_id: Option<Uuid>,
    pub target_node_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Org stats (§4.1 get_org_stats)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrgStats {
    pub node_count: i64,
    pub pending_tasks: i64,
    pub in_progress_tasks: i64,
    pub delegated_tasks: i64,
    pub waiting_tasks: i64,
    pub completed_tasks: i64,
    pub failed_tasks: i64,
    pub cancelled_tasks: i64,
    pub recent_errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_terminal_set() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Waiting.is_terminal());
    }

    #[test]
    fn hitl_queue_status_terminal_set() {
        assert!(!HitlQueueStatus::Pending.is_terminal());
        assert!(HitlQueueStatus::Approved.is_terminal());
        assert!(HitlQueueStatus::Timeout.is_terminal());
    }

    #[test]
    fn node_notification_channels_defaults_empty_on_bad_json() {
        let node = sample_node();
        assert_eq!(node.notification_channels(), Vec::<String>::new());
    }

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
            notification_channels: serde_json::Value::Null,
            position_x: 0.0,
            position_y: 0.0,
            status: NodeStatus::Active,
            current_task_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn task_overdue_only_when_not_terminal() {
        let mut task = sample_task();
        task.deadline = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(task.is_overdue(Utc::now()));
        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue(Utc::now()));
    }

    fn sample_task() -> Task {
        Task {
            task_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            parent_task_id: None,
            assigned_node_id: Uuid::new_v4(),
            title: "t".to_string(),
            description: "d".to_string(),
            input_data: serde_json::json!({}),
            output_data: None,
            context: serde_json::json!({}),
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
}
