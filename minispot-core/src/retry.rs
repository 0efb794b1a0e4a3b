//! Exponential backoff for transient backend failures.

use crate::config::PollingConfig;
use crate::error::Result;
use crate::time::DurationExt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Backoff exponent cap; keeps `2^n` from overflowing long before `max_delay` applies
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// How many times, and how far apart, to retry a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever
    pub max_retries: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`, capped
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let delay_ms = self
            .base_delay
            .as_millis_u64()
            .saturating_mul(2_u64.saturating_pow(exponent));
        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Whether retry number `attempt` (1-based) is still allowed
    #[must_use]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_retries.is_none_or(|max| attempt <= max)
    }
}

impl From<&PollingConfig> for RetryPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            max_retries: (config.max_retries > 0).then_some(config.max_retries),
            base_delay: Duration::from_millis(config.backoff_base_ms),
            max_delay: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

/// Run `op`, retrying transient failures per `policy`.
///
/// Non-transient errors are returned immediately. A rate-limit error waits
/// at least as long as the backend asked. Cancellation during a backoff wait
/// returns the last error without retrying.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, the error is not
/// transient, or `cancel` fires.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0_u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                attempt = attempt.saturating_add(1);
                if !policy.allows_retry(attempt) {
                    return Err(e);
                }

                // Never come back sooner than a Retry-After asked for
                let backoff = policy.delay_for(attempt);
                let delay = e.retry_after().map_or(backoff, |wait| wait.max(backoff));
                warn!(
                    "{} failed (attempt {}): {}; retrying in {:?}",
                    label, attempt, e, delay
                );

                tokio::select! {
                    () = cancel.cancelled() => return Err(e),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}
