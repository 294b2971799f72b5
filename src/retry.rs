//! Retry wrapper (spec §4.3), grounded on `dome_tracker.rs::retry_request`'s backoff
//! ladder (429 → fixed sleep, 5xx → doubling backoff, other 4xx → bail immediately),
//! generalized to the spec's single exponential-with-jitter schedule.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::FetchError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Retries `op` up to [`MAX_ATTEMPTS`] times while it returns a [`FetchError::Retryable`].
/// Delay before attempt *n* (n ≥ 2) is `base * 2^(n-2) + U(0, 500ms)`. A permanent error, or
/// exhaustion of the retryable budget, propagates immediately.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                let backoff = BASE_DELAY * 2u32.pow(attempt - 1);
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
                tracing::debug!(attempt, ?backoff, "retrying after transient upstream error");
                sleep(backoff + jitter).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(FetchError::from_status(503, "busy"))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::from_status(404, "not found"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_propagates_the_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::from_status(500, "still busy"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
