//! Shared types for the AI Organization orchestration core.
//!
//! This crate has no orchestration logic of its own. It carries the pieces
//! that both the orchestration crate and any future worker/admin crate would
//! need: the domain entities, the error taxonomy, configuration, the
//! in-process event bus, and the logging bootstrap.

pub mod config;
pub mod database;
pub mod error;
pub mod event_bus;
pub mod logging;
pub mod resilience;

pub use config::AiOrgConfig;
pub use error::{AiOrgError, AiOrgResult};
pub use event_bus::{AiOrgEvent, EventBus};
