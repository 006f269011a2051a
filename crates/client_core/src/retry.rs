use std::{future::Future, time::Duration};

use storage::StoreResult;
use tracing::warn;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Fixed-delay retry for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Runs `attempt` until it succeeds, fails permanently, or the attempt
    /// budget is spent. At least one attempt is always made.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt_no = 1;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt_no < max_attempts => {
                    warn!(
                        operation,
                        attempt = attempt_no,
                        max_attempts,
                        error = %err,
                        "transient store failure; retrying"
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt_no += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use shared::domain::ContactId;
    use storage::StoreError;

    use super::*;

    fn transient() -> StoreError {
        StoreError::Transient {
            operation: "fetch_all",
            message: "down".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy::default();
        let result = policy
            .run("fetch_all", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(transient())
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempt_budget() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(10),
        };
        let result: StoreResult<()> = policy
            .run("create", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;
        assert_eq!(result, Err(transient()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failures() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: StoreResult<()> = RetryPolicy::default()
            .run("update", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::NotFound(ContactId(1)))
            })
            .await;
        assert_eq!(result, Err(StoreError::NotFound(ContactId(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempt_budget_still_runs_once() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::ZERO,
        };
        let _ = policy
            .run("fetch_all", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transient())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
