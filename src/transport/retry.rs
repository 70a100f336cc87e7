//! Retry policy for transient transport failures
//!
//! Only idempotent requests are retried, only for transient failures
//! (see [`TransportError::is_transient`]), and only up to a small fixed
//! budget. Delays grow exponentially: base, 2x base, 4x base, ...

use std::future::Future;
use std::time::Duration;

use super::config::{TransportConfig, MAX_RETRIES};
use super::error::TransportError;
use super::HttpMethod;

/// Exponent cap so a misconfigured retry budget cannot overflow the delay
const MAX_BACKOFF_SHIFT: u32 = 5;

/// Bounded exponential-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Build the policy from transport configuration, capping the retry budget
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(
            config.max_retries.min(MAX_RETRIES),
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.base_delay * (1u32 << shift)
    }

    /// Whether a failed attempt may be retried
    ///
    /// `attempt` is the 0-based index of the attempt that just failed.
    pub fn should_retry(&self, method: HttpMethod, error: &TransportError, attempt: u32) -> bool {
        method.is_retryable() && error.is_transient() && attempt < self.max_retries
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget is spent
    ///
    /// The error of the last attempt is returned once retries are exhausted.
    pub async fn run<F, Fut, T>(
        &self,
        method: HttpMethod,
        url: &str,
        mut operation: F,
    ) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if self.should_retry(method, &error, attempt) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        %url,
                        attempt,
                        kind = error.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "Transient transport failure, retrying: {}",
                        error
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    if attempt > 0 {
                        tracing::debug!(%url, attempts = attempt + 1, "Giving up after retries");
                    }
                    return Err(error);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}
