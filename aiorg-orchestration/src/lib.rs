//! Task Engine, HITL Manager, and worker pool for an AI Organization core.
//!
//! This crate holds all orchestration logic; `aiorg-shared` carries the
//! entities, error taxonomy, configuration, and event bus both this crate
//! and any future caller depend on.

pub mod config;
pub mod engine;
pub mod hitl;
pub mod llm;
pub mod locks;
pub mod notifier;
pub mod org_lifecycle;
pub mod prompts;
pub mod service;
pub mod store;
pub mod worker;

pub use engine::TaskEngine;
pub use hitl::{HitlManager, HitlOutcome, HitlResolution};
pub use service::AiOrgService;
pub use store::Store;
pub use worker::WorkerPool;
