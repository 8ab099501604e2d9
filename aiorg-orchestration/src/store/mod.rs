//! Durable persistence for orgs, nodes, tasks, responses, HITL actions,
//! queue items, and event logs (C1). One `Store` wraps a single
//! `sqlx::PgPool`; every method is a single statement or a small
//! transaction, never holds a connection across an `.await` boundary that
//! crosses another Store call.

use aiorg_shared::database::{
    EventLog, HitlAction, HitlActionType, HitlQueueItem, HitlQueueStatus, HitlReviewType, Node,
    NodeStatus, Org, OrgStats, OrgStatus, Response, ResponseType, Task, TaskPriority, TaskStatus,
};
use aiorg_shared::{AiOrgError, AiOrgResult};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and runs the embedded migrations, matching the teacher's
    /// `Store::connect` / `MIGRATOR` pairing.
    pub async fn connect(database_url: &str) -> AiOrgResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| AiOrgError::store("connect", e))?;
        aiorg_shared::database::migrator::MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| AiOrgError::store("migrate", sqlx::Error::Migrate(Box::new(e))))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -----------------------------------------------------------------
    // Org
    // -----------------------------------------------------------------

    pub async fn create_org(&self, name: &str, description: Option<&str>, created_by: &str) -> AiOrgResult<Org> {
        sqlx::query_as::<_, Org>(
            r#"INSERT INTO ai_orgs (name, description, status, config, created_by)
               VALUES ($1, $2, 'draft', '{}'::jsonb, $3)
               RETURNING org_id, name, description, status, config, created_by, created_at, updated_at"#,
        )
        .bind(name)
        .bind(description)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("create_org", e))
    }

    pub async fn get_org(&self, org_id: Uuid) -> AiOrgResult<Option<Org>> {
        sqlx::query_as::<_, Org>(
            "SELECT org_id, name, description, status, config, created_by, created_at, updated_at
             FROM ai_orgs WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_org", e))
    }

    pub async fn set_org_status(&self, org_id: Uuid, status: OrgStatus) -> AiOrgResult<()> {
        sqlx::query("UPDATE ai_orgs SET status = $2, updated_at = now() WHERE org_id = $1")
            .bind(org_id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("set_org_status", e))?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Node
    // -----------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_node(
        &self,
        org_id: Uuid,
        parent_node_id: Option<Uuid>,
        role_name: &str,
        role_type: aiorg_shared::database::NodeType,
        description: Option<&str>,
        human_name: &str,
        human_email: &str,
    ) -> AiOrgResult<Node> {
        sqlx::query_as::<_, Node>(
            r#"INSERT INTO ai_nodes (org_id, parent_node_id, role_name, role_type, description, human_name, human_email)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING *"#,
        )
        .bind(org_id)
        .bind(parent_node_id)
        .bind(role_name)
        .bind(role_type)
        .bind(description)
        .bind(human_name)
        .bind(human_email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("create_node", e))
    }

    pub async fn get_node(&self, node_id: Uuid) -> AiOrgResult<Option<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM ai_nodes WHERE node_id = $1")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("get_node", e))
    }

    pub async fn get_root_node(&self, org_id: Uuid) -> AiOrgResult<Option<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM ai_nodes WHERE org_id = $1 AND parent_node_id IS NULL",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_root_node", e))
    }

    pub async fn get_child_nodes(&self, node_id: Uuid) -> AiOrgResult<Vec<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM ai_nodes WHERE parent_node_id = $1 ORDER BY created_at",
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_child_nodes", e))
    }

    pub async fn get_nodes_by_email(&self, email: &str) -> AiOrgResult<Vec<Node>> {
        sqlx::query_as::<_, Node>("SELECT * FROM ai_nodes WHERE human_email = $1")
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("get_nodes_by_email", e))
    }

    pub async fn set_node_status(&self, node_id: Uuid, status: NodeStatus) -> AiOrgResult<()> {
        sqlx::query("UPDATE ai_nodes SET status = $2, updated_at = now() WHERE node_id = $1")
            .bind(node_id)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("set_node_status", e))?;
        Ok(())
    }

    pub async fn set_node_current_task(&self, node_id: Uuid, task_id: Option<Uuid>) -> AiOrgResult<()> {
        sqlx::query("UPDATE ai_nodes SET current_task_id = $2, updated_at = now() WHERE node_id = $1")
            .bind(node_id)
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("set_node_current_task", e))?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Task
    // -----------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_task(
        &self,
        org_id: Uuid,
        parent_task_id: Option<Uuid>,
        assigned_node_id: Uuid,
        title: &str,
        description: &str,
        input_data: serde_json::Value,
        priority: TaskPriority,
    ) -> AiOrgResult<Task> {
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO ai_tasks (org_id, parent_task_id, assigned_node_id, title, description, input_data, priority)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING *"#,
        )
        .bind(org_id)
        .bind(parent_task_id)
        .bind(assigned_node_id)
        .bind(title)
        .bind(description)
        .bind(input_data)
        .bind(priority)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("create_task", e))
    }

    pub async fn get_task(&self, task_id: Uuid) -> AiOrgResult<Option<Task>> {
        sqlx::query_as::<_, Task>("SELECT * FROM ai_tasks WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("get_task", e))
    }

    pub async fn get_subtasks(&self, task_id: Uuid) -> AiOrgResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM ai_tasks WHERE parent_task_id = $1 ORDER BY created_at",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_subtasks", e))
    }

    pub async fn set_task_status(&self, task_id: Uuid, status: TaskStatus) -> AiOrgResult<()> {
        let (started, completed) = match status {
            TaskStatus::InProgress => (true, false),
            _ if status.is_terminal() => (false, true),
            _ => (false, false),
        };
        sqlx::query(
            r#"UPDATE ai_tasks SET status = $2, updated_at = now(),
                 started_at = CASE WHEN $3 AND started_at IS NULL THEN now() ELSE started_at END,
                 completed_at = CASE WHEN $4 THEN now() ELSE completed_at END
               WHERE task_id = $1"#,
        )
        .bind(task_id)
        .bind(status)
        .bind(started)
        .bind(completed)
        .execute(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("set_task_status", e))?;
        Ok(())
    }

    pub async fn set_task_failed(&self, task_id: Uuid, error_message: &str) -> AiOrgResult<()> {
        sqlx::query(
            r#"UPDATE ai_tasks SET status = 'failed', error_message = $2, updated_at = now(),
                 completed_at = now() WHERE task_id = $1"#,
        )
        .bind(task_id)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("set_task_failed", e))?;
        Ok(())
    }

    pub async fn set_task_output(&self, task_id: Uuid, output_data: serde_json::Value) -> AiOrgResult<()> {
        sqlx::query("UPDATE ai_tasks SET output_data = $2, updated_at = now() WHERE task_id = $1")
            .bind(task_id)
            .bind(output_data)
            .execute(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("set_task_output", e))?;
        Ok(())
    }

    /// Sets up delegation: expected response count and strategy. Callers
    /// must create the child tasks first so a crash between the two writes
    /// never leaves `expected_responses` pointing at rows that don't exist.
    pub async fn set_task_delegation(
        &self,
        task_id: Uuid,
        strategy: aiorg_shared::database::DelegationStrategy,
        expected_responses: i32,
    ) -> AiOrgResult<()> {
        sqlx::query(
            r#"UPDATE ai_tasks SET status = 'delegated', delegation_strategy = $2,
                 expected_responses = $3, updated_at = now() WHERE task_id = $1"#,
        )
        .bind(task_id)
        .bind(strategy)
        .bind(expected_responses)
        .execute(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("set_task_delegation", e))?;
        Ok(())
    }

    pub async fn set_task_waiting(&self, task_id: Uuid) -> AiOrgResult<()> {
        sqlx::query("UPDATE ai_tasks SET status = 'waiting', updated_at = now() WHERE task_id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("set_task_waiting", e))?;
        Ok(())
    }

    /// Conditional transition used for every CAS-guarded step in the state
    /// machine (admit's pending->in_progress, aggregate's waiting->in_progress):
    /// only applies if the row is still in `from`, so a duplicate claim after
    /// a restart or a racing worker is a harmless no-op rather than a double
    /// transition.
    pub async fn try_transition_status(&self, task_id: Uuid, from: TaskStatus, to: TaskStatus) -> AiOrgResult<bool> {
        let (started, completed) = match to {
            TaskStatus::InProgress => (true, false),
            _ if to.is_terminal() => (false, true),
            _ => (false, false),
        };
        let result = sqlx::query(
            r#"UPDATE ai_tasks SET status = $3, updated_at = now(),
                 started_at = CASE WHEN $4 AND started_at IS NULL THEN now() ELSE started_at END,
                 completed_at = CASE WHEN $5 THEN now() ELSE completed_at END
               WHERE task_id = $1 AND status = $2"#,
        )
        .bind(task_id)
        .bind(from)
        .bind(to)
        .bind(started)
        .bind(completed)
        .execute(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("try_transition_status", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Persists the sequential-delegation bookkeeping (remaining planned
    /// subtasks not yet admitted) in the Task's opaque `context` blob.
    pub async fn set_task_context(&self, task_id: Uuid, context: serde_json::Value) -> AiOrgResult<()> {
        sqlx::query("UPDATE ai_tasks SET context = $2, updated_at = now() WHERE task_id = $1")
            .bind(task_id)
            .bind(context)
            .execute(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("set_task_context", e))?;
        Ok(())
    }

    pub async fn set_task_failed_with_status(&self, task_id: Uuid, status: TaskStatus, error_message: Option<&str>) -> AiOrgResult<()> {
        sqlx::query(
            r#"UPDATE ai_tasks SET status = $2, error_message = $3, updated_at = now(),
                 completed_at = now() WHERE task_id = $1"#,
        )
        .bind(task_id)
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("set_task_failed_with_status", e))?;
        Ok(())
    }

    /// Tasks not yet in a terminal state, for `get_org_active_tasks` (§6.2).
    pub async fn get_active_tasks(&self, org_id: Uuid) -> AiOrgResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM ai_tasks WHERE org_id = $1
             AND status NOT IN ('completed', 'failed', 'cancelled')
             ORDER BY created_at",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_active_tasks", e))
    }

    /// Orgs whose in-flight tasks a worker pool should poll (both `active`
    /// and `paused`, since paused only refuses new admission — in-flight
    /// work still runs per §4.7).
    pub async fn list_pollable_org_ids(&self) -> AiOrgResult<Vec<Uuid>> {
        sqlx::query_scalar("SELECT org_id FROM ai_orgs WHERE status IN ('active', 'paused')")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("list_pollable_org_ids", e))
    }

    /// Idempotent child-completion bookkeeping: inserts the de-dup row and,
    /// only if the insert actually happened, increments `received_responses`
    /// on the parent. Returns `true` if this call caused the increment (so a
    /// retried `child_complete` for the same child is a harmless no-op).
    pub async fn record_child_complete(&self, parent_task_id: Uuid, child_task_id: Uuid) -> AiOrgResult<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| AiOrgError::store("record_child_complete.begin", e))?;

        let result = sqlx::query(
            "INSERT INTO ai_task_children (parent_task_id, child_task_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(parent_task_id)
        .bind(child_task_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AiOrgError::store("record_child_complete.insert", e))?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            sqlx::query(
                "UPDATE ai_tasks SET received_responses = received_responses + 1, updated_at = now()
                 WHERE task_id = $1",
            )
            .bind(parent_task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AiOrgError::store("record_child_complete.increment", e))?;
        }

        tx.commit().await.map_err(|e| AiOrgError::store("record_child_complete.commit", e))?;
        Ok(inserted)
    }

    // -----------------------------------------------------------------
    // Response
    // -----------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_response(
        &self,
        task_id: Uuid,
        node_id: Uuid,
        response_type: ResponseType,
        content: serde_json::Value,
        summary: Option<&str>,
        reasoning: Option<&str>,
    ) -> AiOrgResult<Response> {
        sqlx::query_as::<_, Response>(
            r#"INSERT INTO ai_responses (task_id, node_id, response_type, content, summary, reasoning)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING *"#,
        )
        .bind(task_id)
        .bind(node_id)
        .bind(response_type)
        .bind(content)
        .bind(summary)
        .bind(reasoning)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("create_response", e))
    }

    pub async fn create_human_override_response(
        &self,
        task_id: Uuid,
        node_id: Uuid,
        content: serde_json::Value,
        original_ai_content: serde_json::Value,
        modification_reason: &str,
        modified_by: &str,
    ) -> AiOrgResult<Response> {
        sqlx::query_as::<_, Response>(
            r#"INSERT INTO ai_responses
                 (task_id, node_id, response_type, content, is_human_modified,
                  original_ai_content, modification_reason, modified_by, modified_at)
               VALUES ($1, $2, 'human_override', $3, true, $4, $5, $6, now())
               RETURNING *"#,
        )
        .bind(task_id)
        .bind(node_id)
        .bind(content)
        .bind(original_ai_content)
        .bind(modification_reason)
        .bind(modified_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("create_human_override_response", e))
    }

    pub async fn get_task_responses(&self, task_id: Uuid) -> AiOrgResult<Vec<Response>> {
        sqlx::query_as::<_, Response>(
            "SELECT * FROM ai_responses WHERE task_id = $1 ORDER BY created_at",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_task_responses", e))
    }

    // -----------------------------------------------------------------
    // HITL queue + actions
    // -----------------------------------------------------------------

    pub async fn create_hitl_queue_item(
        &self,
        org_id: Uuid,
        node_id: Uuid,
        task_id: Uuid,
        review_type: HitlReviewType,
        content: Option<serde_json::Value>,
        expires_at: DateTime<Utc>,
    ) -> AiOrgResult<HitlQueueItem> {
        sqlx::query_as::<_, HitlQueueItem>(
            r#"INSERT INTO ai_hitl_queue (org_id, node_id, task_id, review_type, content, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING *"#,
        )
        .bind(org_id)
        .bind(node_id)
        .bind(task_id)
        .bind(review_type)
        .bind(content)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("create_hitl_queue_item", e))
    }

    pub async fn get_hitl_queue_item(&self, item_id: Uuid) -> AiOrgResult<Option<HitlQueueItem>> {
        sqlx::query_as::<_, HitlQueueItem>("SELECT * FROM ai_hitl_queue WHERE item_id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("get_hitl_queue_item", e))
    }

    pub async fn get_pending_hitl_for_nodes(&self, node_ids: &[Uuid]) -> AiOrgResult<Vec<HitlQueueItem>> {
        sqlx::query_as::<_, HitlQueueItem>(
            "SELECT * FROM ai_hitl_queue WHERE node_id = ANY($1) AND status = 'pending' ORDER BY created_at",
        )
        .bind(node_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_pending_hitl_for_nodes", e))
    }

    pub async fn get_expired_hitl(&self, now: DateTime<Utc>) -> AiOrgResult<Vec<HitlQueueItem>> {
        sqlx::query_as::<_, HitlQueueItem>(
            "SELECT * FROM ai_hitl_queue WHERE status = 'pending' AND expires_at < $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_expired_hitl", e))
    }

    /// Resolves a pending queue item to a terminal status, but only if it is
    /// still pending. Returns `false` if another caller already resolved it
    /// — the single-winner guarantee behind the row-level `UPDATE ... WHERE
    /// status = 'pending'` rather than the in-process lock alone.
    pub async fn resolve_hitl_queue_item(&self, item_id: Uuid, status: HitlQueueStatus) -> AiOrgResult<bool> {
        let result = sqlx::query(
            "UPDATE ai_hitl_queue SET status = $2 WHERE item_id = $1 AND status = 'pending'",
        )
        .bind(item_id)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("resolve_hitl_queue_item", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_hitl_action(
        &self,
        org_id: Uuid,
        node_id: Uuid,
        task_id: Option<Uuid>,
        response_id: Option<Uuid>,
        user_id: &str,
        action_type: HitlActionType,
        original_content: Option<serde_json::Value>,
        modified_content: Option<serde_json::Value>,
        reason: Option<&str>,
        message: Option<&str>,
    ) -> AiOrgResult<HitlAction> {
        sqlx::query_as::<_, HitlAction>(
            r#"INSERT INTO ai_hitl_actions
                 (org_id, node_id, task_id, response_id, user_id, action_type,
                  original_content, modified_content, reason, message)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING *"#,
        )
        .bind(org_id)
        .bind(node_id)
        .bind(task_id)
        .bind(response_id)
        .bind(user_id)
        .bind(action_type)
        .bind(original_content)
        .bind(modified_content)
        .bind(reason)
        .bind(message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("create_hitl_action", e))
    }

    // -----------------------------------------------------------------
    // Event log
    // -----------------------------------------------------------------

    pub async fn write_event_log(
        &self,
        org_id: Uuid,
        event_type: &str,
        source_node_id: Option<Uuid>,
        target_node_id: Option<Uuid>,
        task_id: Option<Uuid>,
        payload: serde_json::Value,
    ) -> AiOrgResult<EventLog> {
        sqlx::query_as::<_, EventLog>(
            r#"INSERT INTO ai_event_logs (org_id, event_type, source_node_id, target_node_id, task_id, payload)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING *"#,
        )
        .bind(org_id)
        .bind(event_type)
        .bind(source_node_id)
        .bind(target_node_id)
        .bind(task_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("write_event_log", e))
    }

    pub async fn get_event_logs(&self, org_id: Uuid, limit: i64) -> AiOrgResult<Vec<EventLog>> {
        sqlx::query_as::<_, EventLog>(
            "SELECT * FROM ai_event_logs WHERE org_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(org_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_event_logs", e))
    }

    pub async fn get_org_stats(&self, org_id: Uuid) -> AiOrgResult<OrgStats> {
        let node_count: i64 = sqlx::query_scalar("SELECT count(*) FROM ai_nodes WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AiOrgError::store("get_org_stats.node_count", e))?;

        let rows: Vec<(TaskStatus, i64)> = sqlx::query_as(
            "SELECT status, count(*) FROM ai_tasks WHERE org_id = $1 GROUP BY status",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_org_stats.task_counts", e))?;

        let mut stats = OrgStats { node_count, ..Default::default() };
        for (status, count) in rows {
            match status {
                TaskStatus::Pending => stats.pending_tasks = count,
                TaskStatus::InProgress => stats.in_progress_tasks = count,
                TaskStatus::Delegated => stats.delegated_tasks = count,
                TaskStatus::Waiting => stats.waiting_tasks = count,
                TaskStatus::Completed => stats.completed_tasks = count,
                TaskStatus::Failed => stats.failed_tasks = count,
                TaskStatus::Cancelled => stats.cancelled_tasks = count,
            }
        }

        stats.recent_errors = sqlx::query_scalar(
            "SELECT error_message FROM ai_tasks WHERE org_id = $1 AND error_message IS NOT NULL
             ORDER BY updated_at DESC LIMIT 10",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AiOrgError::store("get_org_stats.recent_errors", e))?;

        Ok(stats)
    }

    /// Claims one pending-or-resumable task for a worker, locking the row
    /// with `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same task. Returns `None` when there is no work.
    pub async fn claim_next_task(&self, org_id: Uuid) -> AiOrgResult<Option<Task>> {
        let mut tx = self.pool.begin().await.map_err(|e| AiOrgError::store("claim_next_task.begin", e))?;
        let task = sqlx::query_as::<_, Task>(
            r#"SELECT * FROM ai_tasks
               WHERE org_id = $1 AND status IN ('pending', 'waiting')
               ORDER BY
                 CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END,
                 created_at
               FOR UPDATE SKIP LOCKED
               LIMIT 1"#,
        )
        .bind(org_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AiOrgError::store("claim_next_task.select", e))?;

        if let Some(ref t) = task {
            sqlx::query("UPDATE ai_tasks SET updated_at = now() WHERE task_id = $1")
                .bind(t.task_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AiOrgError::store("claim_next_task.touch", e))?;
        }
        tx.commit().await.map_err(|e| AiOrgError::store("claim_next_task.commit", e))?;
        Ok(task)
    }
}
