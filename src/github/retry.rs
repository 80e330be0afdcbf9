//! Backoff for transient GitHub failures.
//!
//! Webhook deliveries retry briefly since GitHub redelivers on its own
//! schedule; a CI run has nobody to redeliver for it and waits longer.
//! Permanent errors are never retried.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::GitHubApiError;

/// Doubling delays: `base`, `2 * base`, `4 * base`... capped at `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries after the first attempt.
    pub retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Backoff {
    /// 2s, 4s, 8s.
    pub const WEBHOOK: Self = Self {
        retries: 3,
        base: Duration::from_secs(2),
        cap: Duration::from_secs(8),
    };

    /// 1s up to 16s, five retries.
    pub const CLI: Self = Self {
        retries: 5,
        base: Duration::from_secs(1),
        cap: Duration::from_secs(30),
    };

    /// A single attempt.
    pub const NONE: Self = Self {
        retries: 0,
        base: Duration::ZERO,
        cap: Duration::ZERO,
    };

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Worst-case time spent sleeping.
    pub fn budget(&self) -> Duration {
        (0..self.retries).map(|retry| self.delay(retry)).sum()
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::WEBHOOK
    }
}

/// Runs `operation` until it succeeds, fails permanently or runs out of
/// retries. The last error is returned as is.
pub async fn with_backoff<T, F, Fut>(
    backoff: Backoff,
    what: &str,
    mut operation: F,
) -> Result<T, GitHubApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitHubApiError>>,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.kind.is_retriable() && retry < backoff.retries => {
                let delay = backoff.delay(retry);
                warn!(
                    operation = what,
                    error = %err,
                    attempt = retry + 1,
                    delay_ms = delay.as_millis() as u64,
                    "transient GitHub failure, retrying"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
