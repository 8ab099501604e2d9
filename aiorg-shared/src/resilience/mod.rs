//! Circuit breaker primitives protecting the LLM provider call (§5: "the LLM
//! provider is accessed through a bounded concurrency gate... to protect
//! external rate limits"). The semaphore in `aiorg-orchestration::llm`
//! bounds concurrency; this module adds fault isolation on top of it, in
//! the host family's circuit-breaker idiom.

mod circuit_breaker;

pub mod behavior;

pub use behavior::CircuitBreakerBehavior;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
