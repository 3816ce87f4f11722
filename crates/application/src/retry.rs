use std::time::Duration;

use domain::common::error::RunnerError;

/// Backoff shape of a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffShape {
    /// Same delay between every attempt. Used for alert-save bulk retries.
    Constant,
    /// Delay doubles per attempt. Used for alert moves after a monitor
    /// definition changed.
    Exponential,
}

/// Bounded retry schedule: `(shape, initial delay, total attempts)`.
///
/// A policy is a value snapshotted from settings at operation start, so a
/// settings reload never changes an in-flight retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub shape: BackoffShape,
    pub initial_delay: Duration,
    /// Total invocations of the operation, including the first.
    pub max_attempts: usize,
}

impl RetryPolicy {
    pub fn constant(initial_delay: Duration, max_attempts: usize) -> Self {
        Self {
            shape: BackoffShape::Constant,
            initial_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn exponential(initial_delay: Duration, max_attempts: usize) -> Self {
        Self {
            shape: BackoffShape::Exponential,
            initial_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        match self.shape {
            BackoffShape::Constant => self.initial_delay,
            BackoffShape::Exponential => {
                let factor = 1u32.checked_shl(u32::try_from(attempt).unwrap_or(u32::MAX))
                    .unwrap_or(u32::MAX);
                self.initial_delay.saturating_mul(factor)
            }
        }
    }
}

/// Invoke `op` until it succeeds, the attempt budget runs out, or an error
/// fails the `should_retry` predicate. The failing error is propagated
/// as-is.
pub async fn retry<T, F, Fut, P>(
    policy: RetryPolicy,
    should_retry: P,
    mut op: F,
) -> Result<T, RunnerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RunnerError>>,
    P: Fn(&RunnerError) -> bool,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= policy.max_attempts || !should_retry(&error) {
                    return Err(error);
                }
                tracing::debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "operation failed, backing off"
                );
                tokio::time::sleep(policy.delay_for(attempt - 1)).await;
                attempt += 1;
            }
        }
    }
}
