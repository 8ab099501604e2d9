//! Layered configuration for the AI Organization core.
//!
//! Loaded via the `config` crate: defaults, then an optional TOML file, then
//! `AIORG_`-prefixed environment variables (via `.env` through `dotenvy`),
//! mirroring the host family's `TaskerConfig` layering convention.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiOrgConfig {
    pub database: DatabaseConfig,
    pub execution: ExecutionConfig,
    pub hitl: HitlSweepConfig,
}

impl Default for AiOrgConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            execution: ExecutionConfig::default(),
            hitl: HitlSweepConfig::default(),
        }
    }
}

impl AiOrgConfig {
    /// Load defaults, then overlay `path` (if it exists), then overlay
    /// `AIORG_`-prefixed environment variables. `.env` is loaded first via
    /// `dotenvy` (best-effort; missing `.env` is not an error).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults)?,
        );

        if let Some(path) = path {
            if std::path::Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AIORG")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/aiorg".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Tunables for the Task Engine worker pool and the LLM bounded-concurrency
/// gate (§5 of the spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub worker_count: usize,
    pub max_concurrent_llm_calls: usize,
    pub worker_poll_interval_ms: u64,
    pub analyze_temperature: f32,
    pub analyze_max_tokens: u32,
    pub execute_temperature: f32,
    pub execute_max_tokens: u32,
    pub aggregate_temperature: f32,
    pub aggregate_max_tokens: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_concurrent_llm_calls: 8,
            worker_poll_interval_ms: 250,
            analyze_temperature: 0.3,
            analyze_max_tokens: 2000,
            execute_temperature: 0.5,
            execute_max_tokens: 3000,
            aggregate_temperature: 0.3,
            aggregate_max_tokens: 4000,
        }
    }
}

impl ExecutionConfig {
    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }
}

/// Default HITL timeout and sweep cadence. Per-node `timeout_hours` and
/// `auto_proceed` (stored on the Node entity) take precedence over these
/// defaults; this only configures the sweeper loop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlSweepConfig {
    pub sweep_interval_secs: u64,
    pub default_timeout_hours: f64,
}

impl Default for HitlSweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            default_timeout_hours: 24.0,
        }
    }
}

impl HitlSweepConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AiOrgConfig::default();
        assert_eq!(cfg.execution.worker_count, 4);
        assert!(cfg.execution.max_concurrent_llm_calls > 0);
        assert_eq!(cfg.database.min_connections, 1);
    }

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let cfg = AiOrgConfig::load(Some("/nonexistent/path.toml")).unwrap();
        assert_eq!(cfg.execution.worker_count, AiOrgConfig::default().execution.worker_count);
    }

    #[test]
    fn duration_helpers() {
        let cfg = ExecutionConfig::default();
        assert_eq!(cfg.worker_poll_interval(), Duration::from_millis(250));
        let hitl = HitlSweepConfig::default();
        assert_eq!(hitl.sweep_interval(), Duration::from_secs(30));
    }
}
