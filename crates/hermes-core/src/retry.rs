//! Bounded exponential-backoff retry for fallible async operations.
//!
//! Wraps a single provider call. Delay growth is strictly exponential with a
//! hard ceiling and no jitter, so tests can assert exact attempt counts and
//! delay schedules. Whether a failure is worth retrying is decided by
//! [`AppError::is_retryable`]; a non-retryable failure propagates after a
//! single attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Retry configuration with exponential backoff.
///
/// Default schedule: 250ms, 500ms, 1s, 2s between the 5 attempts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay slept after the given failed attempt (1-indexed), capped at
    /// `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_delay.mul_f64(factor);
        std::cmp::min(delay, self.max_delay)
    }
}

/// Run `operation` until it succeeds, exhausts `max_attempts`, or fails with
/// a non-retryable error.
pub async fn with_backoff<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, AppError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt == max_attempts {
                    tracing::warn!(
                        attempts = max_attempts,
                        error = %err,
                        "All retry attempts exhausted"
                    );
                    return Err(err);
                }
                if !err.is_retryable() {
                    tracing::debug!(error = %err, "Non-retryable failure, aborting");
                    return Err(err);
                }

                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = %delay.as_millis(),
                    error = %err,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay.mul_f64(config.backoff_multiplier), config.max_delay);
            }
        }
    }

    unreachable!("with_backoff loop always returns within max_attempts")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
            backoff_multiplier: 2.0,
        }
    }

    fn transient() -> AppError {
        AppError::NetworkError("connection reset".into())
    }

    #[tokio::test]
    async fn succeeds_first_try_invokes_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_backoff(&fast_config(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = with_backoff(&fast_config(5), || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err(transient())
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

        // Failed 3 times, succeeded on the 4th.
        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn persistent_failure_invokes_exactly_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = with_backoff(&fast_config(3), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transient())
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, AppError::NetworkError(_)));
    }

    #[tokio::test]
    async fn non_retryable_status_invokes_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = with_backoff(&fast_config(5), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AppError::ProviderError {
                    message: "unauthorized".into(),
                    status_code: 401,
                    retryable: false,
                })
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, AppError::ProviderError { .. }));
    }

    #[test]
    fn delay_schedule_is_exponential_with_ceiling() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(2));
        // Ceiling kicks in well before the growth would.
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(8));
    }

    #[test]
    fn none_config_is_single_attempt() {
        assert_eq!(RetryConfig::none().max_attempts, 1);
        assert_eq!(RetryConfig::none().with_max_attempts(0).max_attempts, 1);
    }
}
