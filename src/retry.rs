//! Bounded retry for backend calls.
//!
//! Wraps an async operation with a fixed attempt ceiling and a fixed
//! inter-attempt delay. Rate-limit (429) and auth (401) failures are never
//! retried; they propagate on the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::api::ApiError;

/// Attempt ceiling for both variants.
pub const MAX_ATTEMPTS: u32 = 3;

/// Inter-attempt delay for general calls.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Inter-attempt delay for data-mutating calls (order placement,
/// settlement recording).
pub const STRICT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Run `op` up to [`MAX_ATTEMPTS`] times with `delay` between attempts.
///
/// `label` is only used for logging. Non-retryable errors ([`ApiError::
/// RateLimited`], [`ApiError::Unauthorized`]) short-circuit immediately.
pub async fn with_retry_delay<F, Fut, T>(
    label: &str,
    delay: Duration,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= MAX_ATTEMPTS => {
                warn!(label, attempt, error = %err, "giving up after final attempt");
                return Err(err);
            }
            Err(err) => {
                warn!(label, attempt, error = %err, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// General-purpose retry: 3 attempts, 1 s apart.
pub async fn with_retry<F, Fut, T>(label: &str, op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    with_retry_delay(label, RETRY_DELAY, op).await
}

/// Stricter variant for mutations: 3 attempts, 2 s apart.
pub async fn with_retry_strict<F, Fut, T>(label: &str, op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    with_retry_delay(label, STRICT_RETRY_DELAY, op).await
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: Result<(), ApiError> = with_retry("t", move || {
            let calls = calls_in_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::RateLimited)
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::RateLimited)));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "429 must not be retried");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: Result<(), ApiError> = with_retry("t", move || {
            let calls = calls_in_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Unauthorized)
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_two_delays() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let started = tokio::time::Instant::now();
        let result = with_retry("t", move || {
            let calls = calls_in_op.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(ApiError::Http {
                        status: 500,
                        message: "server error".to_string(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Exactly two inter-attempt delays elapsed (time is virtual here).
        assert_eq!(started.elapsed(), RETRY_DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_and_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: Result<(), ApiError> = with_retry_strict("t", move || {
            let calls = calls_in_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Network {
                    url: "https://cafe.example".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Network { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
