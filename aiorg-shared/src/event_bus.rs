//! In-process, topic-addressed event bus (C2).
//!
//! Topics are `aiorg:<org_id>`. Delivery is best-effort, unordered across
//! subscribers, at-most-once — a subscriber that isn't listening simply
//! misses the event. The Store remains the source of truth; nothing in the
//! Task Engine or HITL Manager may block on, or branch on, delivery of an
//! event published here.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Minimum event vocabulary from §6.4 of the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiOrgEventType {
    TaskSubmitted,
    TaskProcessing,
    TaskDelegated,
    ResponseReceived,
    TaskCompleted,
    TaskFailed,
    HitlRequired,
    HitlApproved,
    HitlRejected,
    HitlOverridden,
    HitlTimeout,
    NodePaused,
    NodeResumed,
    NotifyFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiOrgEvent {
    #[serde(rename = "type")]
    pub event_type: AiOrgEventType,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl AiOrgEvent {
    pub fn new(event_type: AiOrgEventType, payload: Value) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Utc::now(),
        }
    }
}

const CHANNEL_CAPACITY: usize = 256;

/// Registry of one broadcast channel per org, created lazily on first
/// publish or subscribe.
#[derive(Debug, Default)]
pub struct EventBus {
    topics: DashMap<Uuid, broadcast::Sender<AiOrgEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    fn sender_for(&self, org_id: Uuid) -> broadcast::Sender<AiOrgEvent> {
        self.topics
            .entry(org_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish an event to `aiorg:<org_id>`. Never fails from the caller's
    /// perspective: a "no receivers" condition is not an error.
    pub fn publish(&self, org_id: Uuid, event: AiOrgEvent) {
        let sender = self.sender_for(org_id);
        let _ = sender.send(event);
    }

    pub fn subscribe(&self, org_id: Uuid) -> broadcast::Receiver<AiOrgEvent> {
        self.sender_for(org_id).subscribe()
    }

    pub fn topic(org_id: Uuid) -> String {
        format!("aiorg:{org_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(
            Uuid::new_v4(),
            AiOrgEvent::new(AiOrgEventType::TaskSubmitted, json!({"task_id": "x"})),
        );
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let org_id = Uuid::new_v4();
        let mut rx = bus.subscribe(org_id);

        bus.publish(
            org_id,
            AiOrgEvent::new(AiOrgEventType::TaskCompleted, json!({"task_id": "abc"})),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, AiOrgEventType::TaskCompleted);
    }

    #[tokio::test]
    async fn topics_are_isolated_per_org() {
        let bus = EventBus::new();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        let mut rx_b = bus.subscribe(org_b);

        bus.publish(org_a, AiOrgEvent::new(AiOrgEventType::TaskSubmitted, json!({})));

        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn topic_name_format() {
        let id = Uuid::nil();
        assert_eq!(EventBus::topic(id), format!("aiorg:{id}"));
    }
}
