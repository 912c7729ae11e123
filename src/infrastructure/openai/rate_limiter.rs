use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Shortest sleep between refill checks
const MIN_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    /// Top the bucket up for the time elapsed since the last refill
    fn refill(&mut self, now: Instant, rate: f64, capacity: f64) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        self.last_refill = now;
    }
}

/// Token bucket limiting chat completion requests per second.
///
/// The bucket holds one second worth of tokens and never less than one, so a
/// burst of `requests_per_second` calls goes through without waiting and rates
/// below one request per second still make progress. Clones share the same
/// bucket.
#[derive(Clone)]
pub struct TokenBucketRateLimiter {
    bucket: Arc<Mutex<Bucket>>,
    rate: f64,
    capacity: f64,
}

impl TokenBucketRateLimiter {
    /// # Panics
    /// Panics if the rate is not positive; config validation rejects such values.
    pub fn new(requests_per_second: f64) -> Self {
        assert!(
            requests_per_second.is_finite() && requests_per_second > 0.0,
            "Rate limit must be positive"
        );
        let capacity = requests_per_second.max(1.0);

        Self {
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            })),
            rate: requests_per_second,
            capacity,
        }
    }

    /// Wait until a request may be sent
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(Instant::now(), self.rate, self.capacity);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate).max(MIN_WAIT)
            };

            sleep(wait).await;
        }
    }

    #[cfg(test)]
    async fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), self.rate, self.capacity);
        bucket.tokens
    }
}
