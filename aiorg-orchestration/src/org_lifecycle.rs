//! Pure status gates (C7). The core only reads Org/Node status to admit or
//! refuse an operation; transitions between statuses are an admin concern
//! external to this crate.

use aiorg_shared::database::{NodeStatus, OrgStatus};
use aiorg_shared::AiOrgError;

/// Can a new task be submitted against this org?
pub fn can_submit_task(org_status: OrgStatus) -> Result<(), AiOrgError> {
    match org_status {
        OrgStatus::Active => Ok(()),
        OrgStatus::Draft => Err(AiOrgError::guard("org is draft: task submission refused")),
        OrgStatus::Paused => Err(AiOrgError::guard("org is paused: task submission refused")),
        OrgStatus::Archived => Err(AiOrgError::guard("org is archived: read-only")),
    }
}

/// Can node/role edits be made (node creation, role config changes)?
pub fn can_edit_nodes(org_status: OrgStatus) -> Result<(), AiOrgError> {
    match org_status {
        OrgStatus::Draft | OrgStatus::Active => Ok(()),
        OrgStatus::Paused => Err(AiOrgError::guard("org is paused: node edits refused")),
        OrgStatus::Archived => Err(AiOrgError::guard("org is archived: read-only")),
    }
}

/// Can the Task Engine admit a task onto this node (pending -> in_progress)?
/// In-flight tasks on a paused org continue; only admission of *new* work is
/// refused at the org level, while node-level pause always refuses.
pub fn can_admit_task(org_status: OrgStatus, node_status: NodeStatus) -> Result<(), AiOrgError> {
    if node_status == NodeStatus::Paused {
        return Err(AiOrgError::guard("node is paused: task admission refused"));
    }
    match org_status {
        OrgStatus::Active | OrgStatus::Paused => Ok(()),
        OrgStatus::Draft => Err(AiOrgError::guard("org is draft: task admission refused")),
        OrgStatus::Archived => Err(AiOrgError::guard("org is archived: read-only")),
    }
}

/// HITL decisions (approve/reject/override/message) are processed even
/// while the org is paused or archived — decisions on work already in
/// flight are never blocked.
pub fn can_process_hitl_decision(_org_status: OrgStatus) -> Result<(), AiOrgError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_only_allowed_when_active() {
        assert!(can_submit_task(OrgStatus::Active).is_ok());
        assert!(can_submit_task(OrgStatus::Draft).is_err());
        assert!(can_submit_task(OrgStatus::Paused).is_err());
        assert!(can_submit_task(OrgStatus::Archived).is_err());
    }

    #[test]
    fn admission_continues_while_paused_but_not_while_draft_or_archived() {
        assert!(can_admit_task(OrgStatus::Paused, NodeStatus::Active).is_ok());
        assert!(can_admit_task(OrgStatus::Draft, NodeStatus::Active).is_err());
        assert!(can_admit_task(OrgStatus::Archived, NodeStatus::Active).is_err());
    }

    #[test]
    fn paused_node_always_refuses_admission() {
        assert!(can_admit_task(OrgStatus::Active, NodeStatus::Paused).is_err());
    }

    #[test]
    fn hitl_decisions_always_processed() {
        assert!(can_process_hitl_decision(OrgStatus::Archived).is_ok());
        assert!(can_process_hitl_decision(OrgStatus::Paused).is_ok());
    }
}
