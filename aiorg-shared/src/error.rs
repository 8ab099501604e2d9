//! Error taxonomy for the AI Organization core: guard violations, store
//! faults, HITL protocol violations, invariant violations, and notifier
//! faults. LLM faults are deliberately absent here — they are recoverable
//! by contract and never surface past the Task Engine as an `AiOrgError`
//! (they degrade to defaults instead).

use uuid::Uuid;

pub type AiOrgResult<T> = Result<T, AiOrgError>;

#[derive(Debug, thiserror::Error)]
pub enum AiOrgError {
    /// Org or Node status refuses the requested operation (paused/archived/draft).
    #[error("guard violation: {reason}")]
    GuardViolation { reason: String },

    /// Persistence layer failure. The caller must leave the entity in a
    /// state reachable by retry.
    #[error("store fault during {operation}: {source}")]
    Store {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// An action was attempted on a HITL queue item that is no longer pending.
    #[error("hitl queue item {item_id} is not pending")]
    HitlNotPending { item_id: Uuid },

    /// A structural or counting invariant would be violated by a write.
    #[error("invariant violated: {detail}")]
    InvariantViolated { detail: String },

    /// Input failed boundary validation (submission payload, override content).
    #[error("validation failed: {detail}")]
    Validation { detail: String },

    /// Entity lookup failed where one was required.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },
}

impl AiOrgError {
    pub fn store(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Store {
            operation: operation.into(),
            source,
        }
    }

    pub fn guard(reason: impl Into<String>) -> Self {
        Self::GuardViolation {
            reason: reason.into(),
        }
    }

    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantViolated {
            detail: detail.into(),
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
        }
    }

    /// True for faults that should mark a Task `failed` (store faults and
    /// invariant violations); guard violations and HITL protocol violations
    /// are rejected at entry and never reach a task.
    pub fn is_task_fatal(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::InvariantViolated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_violation_is_not_task_fatal() {
        let err = AiOrgError::guard("org is archived");
        assert!(!err.is_task_fatal());
    }

    #[test]
    fn invariant_violation_is_task_fatal() {
        let err = AiOrgError::invariant("expected_responses exceeded");
        assert!(err.is_task_fatal());
    }

    #[test]
    fn hitl_not_pending_display() {
        let id = Uuid::nil();
        let err = AiOrgError::HitlNotPending { item_id: id };
        assert_eq!(err.to_string(), format!("hitl queue item {id} is not pending"));
    }
}
