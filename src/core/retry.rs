//! Bounded retry with capped exponential backoff for optimistic commits.

use std::future::Future;
use std::time::Duration;

use crate::core::{AwardError, StoreError};

/// Failure of a single attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Business rule failure; returned to the caller as is.
    Fail(AwardError),
    /// Storage failure; retried when transient.
    Store(StoreError),
}

impl From<AwardError> for AttemptError {
    fn from(err: AwardError) -> Self {
        Self::Fail(err)
    }
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Retry settings for read-modify-commit sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a business error, or the
    /// attempts run out. Storage detail never leaves this function: exhausted
    /// or non-transient storage failures become [`AwardError::Transient`].
    ///
    /// # Errors
    ///
    /// The business error returned by `op`, or `Transient`.
    pub async fn run<T, F, Fut>(&self, op_name: &'static str, mut op: F) -> Result<T, AwardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Fail(err)) => return Err(err),
                Err(AttemptError::Store(err)) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        op = op_name,
                        attempt,
                        ?delay,
                        error = %err,
                        "retrying after store conflict"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AttemptError::Store(err)) => {
                    tracing::warn!(op = op_name, attempt, error = %err, "giving up on store operation");
                    return Err(AwardError::Transient);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
        assert_eq!(policy.delay_for(4), Duration::from_millis(50));
        assert_eq!(policy.delay_for(40), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let result = fast()
            .run("test", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AttemptError::Store(StoreError::Conflict))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_conflicts_surface_as_transient() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Store(StoreError::Conflict))
            })
            .await;
        assert_eq!(result, Err(AwardError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn business_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Fail(AwardError::CapacityExceeded))
            })
            .await;
        assert_eq!(result, Err(AwardError::CapacityExceeded));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AttemptError::Store(StoreError::Backend("disk".into())))
            })
            .await;
        assert_eq!(result, Err(AwardError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
