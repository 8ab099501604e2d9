//! Unified circuit breaker interface.
//!
//! Object-safe so consumers can hold `&dyn CircuitBreakerBehavior` when
//! uniform access to any breaker is needed (e.g. a future health endpoint);
//! the concrete `CircuitBreaker` is preferred in hot paths.

use crate::resilience::{CircuitBreakerMetrics, CircuitState};
use std::time::Duration;

pub trait CircuitBreakerBehavior: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn state(&self) -> CircuitState;
    fn should_allow(&self) -> bool;
    fn record_success(&self, duration: Duration);
    fn record_failure(&self, duration: Duration);
    fn is_healthy(&self) -> bool;
    fn force_open(&self);
    fn force_closed(&self);
    fn metrics(&self) -> CircuitBreakerMetrics;
}

impl CircuitBreakerBehavior for crate::resilience::CircuitBreaker {
    fn name(&self) -> &str {
        crate::resilience::CircuitBreaker::name(self)
    }

    fn state(&self) -> CircuitState {
        crate::resilience::CircuitBreaker::state(self)
    }

    fn should_allow(&self) -> bool {
        crate::resilience::CircuitBreaker::should_allow(self)
    }

    fn record_success(&self, duration: Duration) {
        crate::resilience::CircuitBreaker::record_success_manual(self, duration)
    }

    fn record_failure(&self, duration: Duration) {
        crate::resilience::CircuitBreaker::record_failure_manual(self, duration)
    }

    fn is_healthy(&self) -> bool {
        !matches!(self.state(), CircuitState::Open)
    }

    fn force_open(&self) {
        crate::resilience::CircuitBreaker::force_open(self)
    }

    fn force_closed(&self) {
        crate::resilience::CircuitBreaker::force_closed(self)
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        crate::resilience::CircuitBreaker::metrics(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time proof that CircuitBreakerBehavior is object-safe
    fn _assert_object_safe(_: &dyn CircuitBreakerBehavior) {}
}
