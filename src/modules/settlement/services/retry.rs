use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::core::Result;

/// Bounded retry for operations that lose a race on a loan row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; values below 1 behave as 1
    pub max_attempts: u32,
    /// Base delay, multiplied by the attempt number before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Run `operation` until it succeeds, fails with a non-conflict error, or
/// the policy runs out of attempts. Only `ConcurrencyConflict` is retried;
/// each attempt must start a fresh transaction.
pub async fn with_conflict_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Err(e) if e.is_conflict() && attempt < max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Concurrency conflict, retrying"
                );
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
