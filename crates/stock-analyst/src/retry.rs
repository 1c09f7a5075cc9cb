//! Bounded retry with per-attempt timeout
//!
//! Used for the synthesis call: every attempt gets its own deadline and a
//! failed or timed-out attempt is retried after a backoff until the attempt
//! budget is spent.

use crate::config::AnalystConfig;
use crate::error::{AnalystError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Deadline for each individual attempt
    pub attempt_timeout: Duration,

    /// Pause before the first retry
    pub initial_backoff: Duration,

    /// Backoff multiplier for later retries
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_retry(Duration::from_secs(60), Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// One attempt plus exactly one retry
    pub fn single_retry(attempt_timeout: Duration, backoff: Duration) -> Self {
        Self {
            max_attempts: 2,
            attempt_timeout,
            initial_backoff: backoff,
            backoff_multiplier: 2.0,
        }
    }

    /// Synthesis policy for a run
    pub fn for_synthesis(config: &AnalystConfig) -> Self {
        Self::single_retry(config.synthesis_timeout, config.synthesis_retry_backoff)
    }

    /// Create a policy with no retries
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout,
            initial_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Backoff before retry number `retry` (1-based)
    fn backoff_duration(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        self.initial_backoff
            .mul_f64(self.backoff_multiplier.powi(exponent).min(1e6))
    }

    /// Execute an async operation with retry logic
    ///
    /// The operation is called again from scratch for every attempt, so it
    /// must be idempotent. A timed-out attempt counts as a failed one and
    /// surfaces as [`AnalystError::Synthesis`].
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt, max_attempts, operation_name
            );

            let error = match timeout(self.attempt_timeout, operation()).await {
                Ok(Ok(result)) => {
                    if attempt > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(result);
                }
                Ok(Err(e)) => e,
                Err(_) => AnalystError::Synthesis(format!(
                    "{operation_name} timed out after {:?}",
                    self.attempt_timeout
                )),
            };

            if attempt >= max_attempts {
                warn!(
                    "Operation '{}' failed after {} attempts: {}",
                    operation_name, attempt, error
                );
                return Err(error);
            }

            let backoff = self.backoff_duration(attempt);
            warn!(
                "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                operation_name, attempt, max_attempts, error, backoff
            );
            sleep(backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn fast() -> RetryPolicy {
        RetryPolicy::single_retry(Duration::from_millis(200), Duration::from_millis(5))
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::for_synthesis(&AnalystConfig::default());
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(60));
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::single_retry(Duration::from_secs(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count = attempt_count.clone();

        let result = fast()
            .execute("test_op", || {
                let count = count.clone();
                async move {
                    *count.lock().await += 1;
                    Ok::<i32, AnalystError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempt_count.lock().await, 1);
    }

    #[tokio::test]
    async fn test_success_after_one_retry() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count = attempt_count.clone();

        let result = fast()
            .execute("test_op", || {
                let count = count.clone();
                async move {
                    let mut current = count.lock().await;
                    *current += 1;
                    if *current < 2 {
                        Err(AnalystError::Synthesis("quota".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempt_count.lock().await, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_failure() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count = attempt_count.clone();

        let result: Result<i32> = fast()
            .execute("test_op", || {
                let count = count.clone();
                async move {
                    *count.lock().await += 1;
                    Err(AnalystError::Synthesis("down".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(AnalystError::Synthesis(_))));
        assert_eq!(*attempt_count.lock().await, 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count = attempt_count.clone();

        let result = RetryPolicy::single_retry(Duration::from_millis(20), Duration::ZERO)
            .execute("slow_op", || {
                let count = count.clone();
                async move {
                    let first = {
                        let mut current = count.lock().await;
                        *current += 1;
                        *current == 1
                    };
                    if first {
                        sleep(Duration::from_secs(5)).await;
                    }
                    Ok::<&str, AnalystError>("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(*attempt_count.lock().await, 2);
    }

    #[tokio::test]
    async fn test_every_error_kind_is_retried() {
        let attempt_count = Arc::new(Mutex::new(0));
        let count = attempt_count.clone();

        let result: Result<()> = fast()
            .execute("test_op", || {
                let count = count.clone();
                async move {
                    *count.lock().await += 1;
                    Err(AnalystError::Config("bad".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(AnalystError::Config(_))));
        assert_eq!(*attempt_count.lock().await, 2);
    }
}
