//! Re-exports the layered configuration types. Orchestration code depends
//! on this module rather than reaching into `aiorg_shared` directly, so the
//! seam matches the teacher's `orchestration::config` re-export pattern.

pub use aiorg_shared::config::{AiOrgConfig, DatabaseConfig, ExecutionConfig, HitlSweepConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_worker_count() {
        let config = AiOrgConfig::default();
        assert!(config.execution.worker_count > 0);
        assert!(config.hitl.sweep_interval_secs > 0);
    }
}
