use std::future::Future;
use std::time::Duration;

use crate::error::AppResult;

/// Backoff policy: `attempts` tries in total, sleeping `base_delay * 2^n`
/// after the n-th failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Delay slept after failed attempt `n` (zero-based).
    #[must_use]
    pub fn delay_after(&self, n: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(n))
    }
}

/// Run `op` until it succeeds or the policy is exhausted. The error of the last
/// attempt is returned; non-retryable errors are returned immediately.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < policy.attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    operation = label,
                    attempt = attempt + 1,
                    max_attempts = policy.attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    operation = label,
                    attempts = attempt + 1,
                    error = %e,
                    "Giving up"
                );
                return Err(e);
            }
        }
    }
}
