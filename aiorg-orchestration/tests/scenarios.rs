//! End-to-end scenarios over a real Postgres schema, exercising the Task
//! Engine and HITL Manager together through `AiOrgService`.

use std::sync::Arc;

use aiorg_orchestration::config::ExecutionConfig;
use aiorg_orchestration::llm::{BoundedLlmProvider, ScriptedLlmProvider, StaticLlmProvider};
use aiorg_orchestration::notifier::LoggingNotifier;
use aiorg_orchestration::{AiOrgService, Store};
use aiorg_shared::database::{HitlQueueStatus, NodeType, ResponseType, TaskPriority, TaskStatus};
use aiorg_shared::EventBus;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

async fn service_with(pool: PgPool, llm_response: impl Into<String>) -> (AiOrgService, Arc<Store>) {
    let store = Arc::new(Store::new(pool));
    let events = Arc::new(EventBus::new());
    let llm = Arc::new(BoundedLlmProvider::new(Arc::new(StaticLlmProvider::new(llm_response.into())), 4));
    let notifier = Arc::new(LoggingNotifier);
    let service = AiOrgService::new(store.clone(), events, llm, notifier, ExecutionConfig::default());
    (service, store)
}

async fn service_scripted(pool: PgPool, responses: Vec<&str>) -> (AiOrgService, Arc<Store>) {
    let store = Arc::new(Store::new(pool));
    let events = Arc::new(EventBus::new());
    let llm = Arc::new(BoundedLlmProvider::new(Arc::new(ScriptedLlmProvider::new(responses)), 4));
    let notifier = Arc::new(LoggingNotifier);
    let service = AiOrgService::new(store.clone(), events, llm, notifier, ExecutionConfig::default());
    (service, store)
}

async fn make_org(store: &Store, name: &str) -> Uuid {
    let org = store.create_org(name, None, "tester").await.unwrap();
    store.set_org_status(org.org_id, aiorg_shared::database::OrgStatus::Active).await.unwrap();
    org.org_id
}

/// S1 — single-node direct execution.
#[sqlx::test(migrator = "aiorg_shared::database::migrator::MIGRATOR")]
async fn s1_single_node_direct_execution(pool: PgPool) {
    let (service, store) = service_with(
        pool,
        r#"{"summary": "S", "findings": [], "recommendations": []}"#,
    )
    .await;
    let org_id = make_org(&store, "Org S1").await;
    let n1 = store.create_node(org_id, None, "CEO", NodeType::Executive, None, "Alex", "alex@example.com").await.unwrap();

    let task = service
        .submit_task(org_id, n1.node_id, "Summarize 'X'", "desc", serde_json::json!({}), TaskPriority::Medium, None, "tester")
        .await
        .unwrap();

    let processed = service.drain(org_id).await.unwrap();
    assert_eq!(processed, 1);

    let task = store.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.output_data.unwrap()["summary"], serde_json::json!("S"));

    let responses = store.get_task_responses(task.task_id).await.unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].response_type, ResponseType::Analysis);
}

/// S2 — one-level parallel delegation with full success.
#[sqlx::test(migrator = "aiorg_shared::database::migrator::MIGRATOR")]
async fn s2_parallel_delegation_full_success(pool: PgPool) {
    let (service, store) = service_scripted(
        pool,
        vec![
            // N1 analyze
            r#"{"needs_delegation": true, "delegation_plan": {"strategy": "parallel", "subtasks": [
                {"title": "A", "description": "do a", "assigned_to": "N2"},
                {"title": "B", "description": "do b", "assigned_to": "N3"}
            ]}}"#,
            // N2 execute
            r#"{"summary": "A"}"#,
            // N3 execute
            r#"{"summary": "B"}"#,
            // N1 aggregate
            r#"{"executive_summary": "A+B", "summary": "A+B"}"#,
        ],
    )
    .await;

    let org_id = make_org(&store, "Org S2").await;
    let n1 = store.create_node(org_id, None, "CEO", NodeType::Executive, None, "Alex", "alex@example.com").await.unwrap();
    let n2 = store.create_node(org_id, Some(n1.node_id), "N2", NodeType::Analyst, None, "Bo", "bo@example.com").await.unwrap();
    let n3 = store.create_node(org_id, Some(n1.node_id), "N3", NodeType::Analyst, None, "Cy", "cy@example.com").await.unwrap();
    let _ = (&n2, &n3);

    let root = service
        .submit_task(org_id, n1.node_id, "Quarterly plan", "desc", serde_json::json!({}), TaskPriority::Medium, None, "tester")
        .await
        .unwrap();

    // drain may need multiple passes: root admits + delegates, then children
    // run, then root aggregates once both land.
    for _ in 0..5 {
        service.drain(org_id).await.unwrap();
    }

    let root = store.get_task(root.task_id).await.unwrap().unwrap();
    assert_eq!(root.status, TaskStatus::Completed);
    assert_eq!(root.output_data.as_ref().unwrap()["executive_summary"], serde_json::json!("A+B"));
    assert_eq!(root.expected_responses, 2);
    assert_eq!(root.received_responses, 2);

    let subtasks = store.get_subtasks(root.task_id).await.unwrap();
    assert_eq!(subtasks.len(), 2);
    assert!(subtasks.iter().all(|t| t.status == TaskStatus::Completed));

    let root_responses = store.get_task_responses(root.task_id).await.unwrap();
    assert_eq!(root_responses.len(), 2); // delegation_plan + summary
}

/// S3 — sequential delegation, one child fails via an engine-level `fail_task`
/// call (simulating a store fault downstream), the other completes; parent
/// still reaches `completed` with a partial-failure note.
#[sqlx::test(migrator = "aiorg_shared::database::migrator::MIGRATOR")]
async fn s3_sequential_delegation_partial_failure(pool: PgPool) {
    let (service, store) = service_scripted(
        pool,
        vec![
            r#"{"needs_delegation": true, "delegation_plan": {"strategy": "sequential", "subtasks": [
                {"title": "A", "description": "do a", "assigned_to": "N2"},
                {"title": "B", "description": "do b", "assigned_to": "N3"}
            ]}}"#,
            // N3 execute (N2 fails before reaching an LLM call)
            r#"{"summary": "B"}"#,
            // N1 aggregate
            r#"{"executive_summary": "partial", "summary": "partial"}"#,
        ],
    )
    .await;

    let org_id = make_org(&store, "Org S3").await;
    let n1 = store.create_node(org_id, None, "CEO", NodeType::Executive, None, "Alex", "alex@example.com").await.unwrap();
    store.create_node(org_id, Some(n1.node_id), "N2", NodeType::Analyst, None, "Bo", "bo@example.com").await.unwrap();
    store.create_node(org_id, Some(n1.node_id), "N3", NodeType::Analyst, None, "Cy", "cy@example.com").await.unwrap();

    let root = service
        .submit_task(org_id, n1.node_id, "Sequential plan", "desc", serde_json::json!({}), TaskPriority::Medium, None, "tester")
        .await
        .unwrap();

    // First pass: admit + analyze + delegate (creates first child only).
    service.drain(org_id).await.unwrap();

    let subtasks = store.get_subtasks(root.task_id).await.unwrap();
    assert_eq!(subtasks.len(), 1);
    let first_child = subtasks[0].task_id;

    service.engine().fail_task(first_child, "simulated store fault").await.unwrap();

    // Next drain: second child gets created and processed, then aggregation.
    for _ in 0..4 {
        service.drain(org_id).await.unwrap();
    }

    let root = store.get_task(root.task_id).await.unwrap().unwrap();
    assert_eq!(root.status, TaskStatus::Completed);
    let output = root.output_data.unwrap();
    assert!(output.get("partial_failure").is_some());

    let subtasks = store.get_subtasks(root.task_id).await.unwrap();
    assert_eq!(subtasks.len(), 2);
    assert!(subtasks.iter().any(|t| t.status == TaskStatus::Failed));
    assert!(subtasks.iter().any(|t| t.status == TaskStatus::Completed));
}

/// S4 — HITL response_approval with a human override.
#[sqlx::test(migrator = "aiorg_shared::database::migrator::MIGRATOR")]
async fn s4_hitl_response_approval_override(pool: PgPool) {
    let (service, store) = service_with(pool, r#"{"summary": "AI_ANSWER"}"#).await;
    let org_id = make_org(&store, "Org S4").await;
    let n1 = store.create_node(org_id, None, "CEO", NodeType::Executive, None, "Alex", "alex@example.com").await.unwrap();
    sqlx::query("UPDATE ai_nodes SET hitl_enabled = true, hitl_approval_required = true WHERE node_id = $1")
        .bind(n1.node_id)
        .execute(store.pool())
        .await
        .unwrap();

    let task = service
        .submit_task(org_id, n1.node_id, "Decide", "desc", serde_json::json!({}), TaskPriority::Medium, None, "tester")
        .await
        .unwrap();
    service.drain(org_id).await.unwrap();

    let pending = service.hitl_list_pending("alex@example.com").await.unwrap();
    assert_eq!(pending.len(), 1);
    let item_id = pending[0].item.item_id;

    service.hitl_override(item_id, "alex", serde_json::json!({"summary": "HUMAN"}), "clarity").await.unwrap();

    let task = store.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.output_data.unwrap()["summary"], serde_json::json!("HUMAN"));

    let responses = store.get_task_responses(task.task_id).await.unwrap();
    assert!(responses.iter().any(|r| r.response_type == ResponseType::HumanOverride));

    let item = store.get_hitl_queue_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.status, HitlQueueStatus::Overridden);
}

/// S5 — HITL timeout with auto_proceed promotes the original candidate.
#[sqlx::test(migrator = "aiorg_shared::database::migrator::MIGRATOR")]
async fn s5_hitl_timeout_auto_proceed(pool: PgPool) {
    let (service, store) = service_with(pool, r#"{"summary": "AI_ANSWER"}"#).await;
    let org_id = make_org(&store, "Org S5").await;
    let n1 = store.create_node(org_id, None, "CEO", NodeType::Executive, None, "Alex", "alex@example.com").await.unwrap();
    sqlx::query(
        "UPDATE ai_nodes SET hitl_enabled = true, hitl_approval_required = true,
           hitl_timeout_hours = 1, hitl_auto_proceed = true WHERE node_id = $1",
    )
    .bind(n1.node_id)
    .execute(store.pool())
    .await
    .unwrap();

    let task = service
        .submit_task(org_id, n1.node_id, "Decide", "desc", serde_json::json!({}), TaskPriority::Medium, None, "tester")
        .await
        .unwrap();
    service.drain(org_id).await.unwrap();

    let later = Utc::now() + chrono::Duration::hours(1) + chrono::Duration::milliseconds(1);
    let processed = service.sweep_hitl_timeouts(later).await.unwrap();
    assert_eq!(processed, 1);

    let task = store.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.output_data.unwrap()["summary"], serde_json::json!("AI_ANSWER"));
}

/// S6 — reject at task_received fails the task before any analysis runs.
#[sqlx::test(migrator = "aiorg_shared::database::migrator::MIGRATOR")]
async fn s6_reject_at_task_received(pool: PgPool) {
    let (service, store) = service_with(pool, r#"{"summary": "unused"}"#).await;
    let org_id = make_org(&store, "Org S6").await;
    let n1 = store.create_node(org_id, None, "CEO", NodeType::Executive, None, "Alex", "alex@example.com").await.unwrap();
    sqlx::query("UPDATE ai_nodes SET hitl_enabled = true WHERE node_id = $1").bind(n1.node_id).execute(store.pool()).await.unwrap();

    let task = service
        .submit_task(org_id, n1.node_id, "Out of scope ask", "desc", serde_json::json!({}), TaskPriority::Medium, None, "tester")
        .await
        .unwrap();
    service.drain(org_id).await.unwrap();

    let pending = service.hitl_list_pending("alex@example.com").await.unwrap();
    assert_eq!(pending.len(), 1);
    let item_id = pending[0].item.item_id;

    service.hitl_reject(item_id, "alex", "out of scope").await.unwrap();

    let task = store.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_message.as_deref(), Some("HITL rejected: out of scope"));

    let responses = store.get_task_responses(task.task_id).await.unwrap();
    assert!(responses.is_empty());
}
