//! Retry policy with exponential backoff.
//!
//! Used for the "retried once" failure semantics called out for navigation
//! timeouts: a `RetryPolicy` with `max_attempts = 2` retries exactly once.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Retry exactly once, as required for browser navigation timeouts.
    pub fn retry_once(initial_backoff_ms: u64) -> Self {
        Self {
            max_attempts: 2,
            initial_backoff_ms,
            max_backoff_ms: initial_backoff_ms * 4,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }

    pub fn backoff_duration(&self, attempt: usize) -> Duration {
        let base_ms = (self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32))
            .min(self.max_backoff_ms as f64);
        let ms = if self.use_jitter {
            let jitter = rand::thread_rng().gen_range(0.8..1.2);
            (base_ms * jitter) as u64
        } else {
            base_ms as u64
        };
        Duration::from_millis(ms)
    }

    /// Execute an async operation, retrying on error up to `max_attempts`.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(attempt, %err, "operation failed, no attempts remaining");
                        return Err(err);
                    }
                    let backoff = self.backoff_duration(attempt - 1);
                    warn!(attempt, %err, ?backoff, "operation failed, retrying");
                    sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_exactly_once() {
        let policy = RetryPolicy::retry_once(1);
        let calls = AtomicUsize::new(0);
        let result: Result<(), &str> = policy
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let policy = RetryPolicy::retry_once(1);
        let result = policy.execute(|| async { Ok::<_, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
