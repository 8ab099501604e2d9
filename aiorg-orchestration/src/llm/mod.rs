//! LLM provider abstraction and the bounded-concurrency gate in front of it.
//!
//! The Task Engine never talks to a model directly; it calls through a
//! `BoundedLlmProvider` wrapping an `Arc<dyn LlmProvider>`, a semaphore sized
//! from `ExecutionConfig::max_concurrent_llm_calls`, and an
//! `aiorg_shared::resilience::CircuitBreaker` that trips on repeated
//! provider faults so a failing upstream doesn't pile up timed-out calls
//! behind the semaphore.

use std::sync::Arc;
use std::time::{Duration, Instant};

use aiorg_shared::resilience::CircuitBreaker;
use async_trait::async_trait;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm call failed: {0}")]
    CallFailed(String),
    #[error("llm call rejected: circuit open for {0}")]
    CircuitOpen(String),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

/// Wraps any `LlmProvider` with a concurrency gate and a circuit breaker.
/// Both are fault-isolation layers only — a tripped circuit or an LLM error
/// is recoverable by contract and degrades the calling phase rather than
/// failing the task (see the Task Engine's analyze/aggregate defaults).
pub struct BoundedLlmProvider {
    inner: Arc<dyn LlmProvider>,
    semaphore: Arc<Semaphore>,
    breaker: Arc<CircuitBreaker>,
}

impl BoundedLlmProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            breaker: Arc::new(CircuitBreaker::new("llm_provider".to_string(), Default::default())),
        }
    }

    pub async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        if !self.breaker.should_allow() {
            return Err(LlmError::CircuitOpen(self.breaker.name().to_string()));
        }
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");

        let start = Instant::now();
        match self.inner.complete(request).await {
            Ok(text) => {
                self.breaker.record_success_manual(start.elapsed());
                Ok(text)
            }
            Err(err) => {
                self.breaker.record_failure_manual(start.elapsed());
                Err(err)
            }
        }
    }
}

/// Deterministic test double: returns a canned, valid JSON response without
/// touching any network. Useful for exercising the Task Engine's happy path
/// without a real provider.
#[derive(Debug, Clone)]
pub struct StaticLlmProvider {
    pub response: String,
    pub delay: Duration,
}

impl StaticLlmProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl LlmProvider for StaticLlmProvider {
    async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.response.clone())
    }
}

/// Always fails, for exercising the Task Engine's LLM-fault degrade paths.
#[derive(Debug, Clone, Default)]
pub struct FailingLlmProvider;

#[async_trait]
impl LlmProvider for FailingLlmProvider {
    async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
        Err(LlmError::CallFailed("provider unavailable".to_string()))
    }
}

/// Returns canned responses in call order, one per `complete` invocation.
/// Needed wherever a single test exercises more than one LLM-facing phase
/// (analyze then aggregate, or analyze for a parent then again for a
/// child) and each phase needs a different canned reply. Panics once
/// exhausted — a test should script exactly as many replies as it expects
/// calls.
pub struct ScriptedLlmProvider {
    responses: tokio::sync::Mutex<std::collections::VecDeque<String>>,
}

impl ScriptedLlmProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: tokio::sync::Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn complete(&self, _request: LlmRequest) -> Result<String, LlmError> {
        let mut queue = self.responses.lock().await;
        queue
            .pop_front()
            .ok_or_else(|| LlmError::CallFailed("ScriptedLlmProvider exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_provider_delegates_to_inner() {
        let provider = BoundedLlmProvider::new(Arc::new(StaticLlmProvider::new("{}")), 2);
        let result = provider
            .complete(LlmRequest {
                system: "sys".into(),
                prompt: "p".into(),
                temperature: 0.3,
                max_tokens: 100,
            })
            .await;
        assert_eq!(result.unwrap(), "{}");
    }

    #[tokio::test]
    async fn failing_provider_returns_error() {
        let provider = BoundedLlmProvider::new(Arc::new(FailingLlmProvider), 2);
        let result = provider
            .complete(LlmRequest {
                system: "sys".into(),
                prompt: "p".into(),
                temperature: 0.3,
                max_tokens: 100,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn scripted_provider_replies_in_order_then_errors() {
        let provider = ScriptedLlmProvider::new(["first", "second"]);
        let req = || LlmRequest {
            system: "sys".into(),
            prompt: "p".into(),
            temperature: 0.3,
            max_tokens: 100,
        };
        assert_eq!(provider.complete(req()).await.unwrap(), "first");
        assert_eq!(provider.complete(req()).await.unwrap(), "second");
        assert!(provider.complete(req()).await.is_err());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let provider = Arc::new(BoundedLlmProvider::new(
            Arc::new(StaticLlmProvider {
                response: "{}".to_string(),
                delay: Duration::from_millis(50),
            }),
            1,
        ));
        let req = || LlmRequest {
            system: "sys".into(),
            prompt: "p".into(),
            temperature: 0.3,
            max_tokens: 100,
        };
        let a = provider.clone();
        let b = provider.clone();
        let start = Instant::now();
        let (_, _) = tokio::join!(a.complete(req()), b.complete(req()));
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
