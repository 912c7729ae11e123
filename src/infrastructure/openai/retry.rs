use super::errors::OpenAiError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for transient API failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Initial backoff duration in milliseconds
    initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Panics
    /// Panics on a zero retry count or an inverted backoff range; config
    /// validation rejects such values.
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        assert!(max_retries > 0, "max_retries must be greater than 0");
        assert!(
            initial_backoff_ms > 0,
            "initial_backoff_ms must be greater than 0"
        );
        assert!(
            max_backoff_ms >= initial_backoff_ms,
            "max_backoff_ms must be >= initial_backoff_ms"
        );

        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Execute an operation with exponential backoff retry logic
    ///
    /// Transient errors are retried up to `max_retries` times; permanent
    /// errors are returned immediately.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, OpenAiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OpenAiError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if self.should_retry(&err, attempt) {
                        let backoff = self.calculate_backoff(attempt);
                        warn!(
                            "Attempt {} failed with transient error: {}. Retrying in {:?}...",
                            attempt + 1,
                            err,
                            backoff
                        );

                        sleep(backoff).await;
                        attempt += 1;
                    } else {
                        if attempt >= self.max_retries {
                            warn!("Operation failed after {} attempts: {}", attempt + 1, err);
                        } else {
                            debug!("Permanent error, not retrying: {}", err);
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Formula: min(initial_backoff * 2^attempt, max_backoff)
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        Duration::from_millis(backoff_ms)
    }

    fn should_retry(&self, error: &OpenAiError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

impl Default for RetryPolicy {
    /// 3 retries, backing off from 1 second up to 30 seconds
    fn default() -> Self {
        Self::new(3, 1_000, 30_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy::new(5, 1000, 60000);

        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(1000));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(4000));
        assert_eq!(policy.calculate_backoff(5), Duration::from_millis(32000));
        assert_eq!(policy.calculate_backoff(6), Duration::from_millis(60000));
        assert_eq!(policy.calculate_backoff(40), Duration::from_millis(60000));
    }

    #[test]
    fn test_should_retry_classification() {
        let policy = RetryPolicy::new(3, 1000, 60000);

        assert!(policy.should_retry(&OpenAiError::RateLimitExceeded, 0));
        assert!(policy.should_retry(&OpenAiError::Timeout, 2));
        assert!(!policy.should_retry(&OpenAiError::Timeout, 3));
        assert!(!policy.should_retry(&OpenAiError::InvalidApiKey, 0));
        assert!(policy.should_retry(
            &OpenAiError::ServerError(StatusCode::SERVICE_UNAVAILABLE, "down".to_string()),
            1
        ));
    }

    #[tokio::test]
    async fn test_execute_retries_then_succeeds() {
        let policy = RetryPolicy::new(3, 1, 10);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(OpenAiError::RateLimitExceeded)
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_stops_on_permanent_error() {
        let policy = RetryPolicy::new(3, 1, 10);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result: Result<(), _> = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OpenAiError::InvalidApiKey)
                }
            })
            .await;

        assert!(matches!(result, Err(OpenAiError::InvalidApiKey)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_gives_up_after_max_retries() {
        let policy = RetryPolicy::new(2, 1, 10);
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result: Result<(), _> = policy
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OpenAiError::Timeout)
                }
            })
            .await;

        assert!(matches!(result, Err(OpenAiError::Timeout)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
