//! Token-bucket rate limiting for outbound provider requests.
//!
//! Each provider gets its own bucket sized to that backend's request
//! ceiling. Refill is lazy: tokens accrue as a function of elapsed time on
//! every access, so no background task is needed. Callers `await` on
//! [`TokenBucket::consume`], which sleeps for the exact deficit before
//! retrying the deduction.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared-state token bucket. Cloning yields another handle to the same
/// bucket, so all callers pacing against one provider share one budget.
#[derive(Clone, Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    inner: Arc<Mutex<BucketInner>>,
}

#[derive(Debug)]
struct BucketInner {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// `capacity` caps burst size; `refill_rate` is tokens per second.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_rate,
            inner: Arc::new(Mutex::new(BucketInner {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            })),
        }
    }

    /// One request per `interval` with no burst allowance.
    pub fn per_interval(interval: Duration) -> Self {
        Self::new(1, 1.0 / interval.as_secs_f64())
    }

    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, BucketInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned rate limiter mutex");
            poisoned.into_inner()
        })
    }

    fn refill(&self, inner: &mut BucketInner) {
        let elapsed = inner.last_refill.elapsed().as_secs_f64();
        inner.tokens = (inner.tokens + elapsed * self.refill_rate).min(self.capacity);
        inner.last_refill = Instant::now();
    }

    /// Suspend until `tokens_needed` tokens are available, then deduct them.
    ///
    /// The lock is never held across a sleep; after waking, the deduction is
    /// retried, so concurrent consumers cannot overdraw the bucket.
    pub async fn consume(&self, tokens_needed: f64) {
        loop {
            let wait = {
                let mut inner = self.lock_inner();
                self.refill(&mut inner);

                if inner.tokens >= tokens_needed {
                    inner.tokens -= tokens_needed;
                    return;
                }

                let deficit = tokens_needed - inner.tokens;
                Duration::from_secs_f64(deficit / self.refill_rate)
            };

            tracing::debug!(wait_ms = %wait.as_millis(), "Rate limit: waiting for tokens");
            tokio::time::sleep(wait).await;
        }
    }

    /// Restore full capacity immediately (manual recovery, e.g. after a
    /// configuration change).
    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        inner.tokens = self.capacity;
        inner.last_refill = Instant::now();
    }

    /// Tokens currently available, after a lazy refill.
    pub fn available(&self) -> f64 {
        let mut inner = self.lock_inner();
        self.refill(&mut inner);
        inner.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consume_within_capacity_is_immediate() {
        let bucket = TokenBucket::new(5, 5.0);

        let start = Instant::now();
        for _ in 0..5 {
            bucket.consume(1.0).await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn empty_bucket_waits_for_refill() {
        let bucket = TokenBucket::new(2, 10.0);
        bucket.consume(2.0).await;

        let start = Instant::now();
        bucket.consume(1.0).await;
        let elapsed = start.elapsed();

        // 1 token at 10 tokens/s is a 100ms deficit.
        assert!(
            elapsed >= Duration::from_millis(90),
            "expected ~100ms wait, got {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn refill_is_capped_at_capacity() {
        let bucket = TokenBucket::new(3, 1000.0);
        bucket.consume(3.0).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(bucket.available() <= 3.0);
    }

    #[tokio::test]
    async fn reset_restores_full_capacity() {
        let bucket = TokenBucket::new(4, 0.001);
        bucket.consume(4.0).await;
        assert!(bucket.available() < 1.0);

        bucket.reset();
        assert!(bucket.available() >= 4.0 - f64::EPSILON);
    }

    #[tokio::test]
    async fn clones_share_one_budget() {
        let bucket = TokenBucket::new(2, 0.001);
        let other = bucket.clone();

        bucket.consume(2.0).await;
        assert!(other.available() < 1.0);
    }

    #[tokio::test]
    async fn per_interval_paces_sequential_calls() {
        let bucket = TokenBucket::per_interval(Duration::from_millis(100));
        bucket.consume(1.0).await;

        let start = Instant::now();
        bucket.consume(1.0).await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
