//! Retry provider — decorator that adds automatic retry with exponential backoff.
//!
//! Wraps any [`Provider`] and retries transient failures (5xx, rate limits,
//! timeouts, network errors). Fatal failures (auth, unknown model, other
//! 4xx, malformed requests) are returned on the first attempt.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tinyreact_core::error::ProviderError;
use tinyreact_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::warn;

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Default: 3.
    pub max_attempts: u32,
    /// Base delay for exponential backoff. Default: 1000 ms.
    pub base_delay_ms: u64,
    /// Cap on any single delay. Default: 30000 ms.
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-indexed): `base * 2^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponential = self.base_delay_ms.saturating_mul(1u64 << retry.min(16));
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl From<&tinyreact_config::RetryConfig> for RetryPolicy {
    fn from(c: &tinyreact_config::RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            base_delay_ms: c.base_delay_ms,
            max_delay_ms: c.max_delay_ms,
        }
    }
}

/// A decorator provider that retries transient errors.
pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    policy: RetryPolicy,
    /// Bound on each individual attempt; an expired attempt counts as a
    /// transient `Timeout`.
    attempt_timeout: Option<Duration>,
}

impl std::fmt::Debug for RetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryProvider")
            .field("inner", &self.inner.name())
            .field("policy", &self.policy)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    async fn attempt(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError> {
        match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.complete(request))
                .await
                .unwrap_or_else(|_| {
                    Err(ProviderError::Timeout(format!(
                        "{} did not answer within {}s",
                        self.inner.name(),
                        limit.as_secs()
                    )))
                }),
            None => self.inner.complete(request).await,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let mut delay = self.policy.delay_for(attempt - 1);
                    if let ProviderError::RateLimited { retry_after_secs } = &err {
                        let hinted = Duration::from_secs(*retry_after_secs)
                            .min(Duration::from_millis(self.policy.max_delay_ms));
                        delay = delay.max(hinted);
                    }
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying completion after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
