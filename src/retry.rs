//! Retry and backoff helpers for cloud engine calls.
//!
//! Network-calling adapters wrap their requests in [`retry_async`] with the
//! standard policy (3 attempts, ~4s base delay, 10s cap). Local engines
//! (tesseract, ocrs) never retry.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::ocr::engine::EngineError;

/// Default number of attempts for external engine calls.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(4);

/// Default delay cap.
pub const DEFAULT_DELAY_CAP: Duration = Duration::from_secs(10);

/// Calculate exponential backoff delay for a given attempt (0-based).
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let delay = base.saturating_mul(2u32.saturating_pow(attempt));
    delay.min(cap)
}

/// Run `op` until it succeeds, fails terminally, or exhausts `max_attempts`.
///
/// Only transient failures (see [`EngineError::is_transient`]) are retried;
/// anything else is returned to the caller on the first occurrence.
pub async fn retry_async<T, F, Fut>(
    label: &str,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let delay = backoff_delay(attempt, base, cap);
                warn!(
                    "{}: transient failure (attempt {}/{}), retrying in {:?}: {}",
                    label,
                    attempt + 1,
                    max_attempts,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Retry with the standard external-call policy.
pub async fn retry_external<T, F, Fut>(label: &str, op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    retry_async(label, DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY, DEFAULT_DELAY_CAP, op).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(4);
        let cap = Duration::from_secs(10);
        assert_eq!(backoff_delay(0, base, cap), Duration::from_secs(4));
        assert_eq!(backoff_delay(1, base, cap), Duration::from_secs(8));
        assert_eq!(backoff_delay(2, base, cap), Duration::from_secs(10));
        assert_eq!(backoff_delay(9, base, cap), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_async(
            "test",
            3,
            Duration::from_millis(1),
            Duration::from_millis(2),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(EngineError::Transport("connection reset".into()))
                    } else {
                        Ok(42u32)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_terminal_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = retry_async(
            "test",
            3,
            Duration::from_millis(1),
            Duration::from_millis(2),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(EngineError::Unavailable("no api key".into())) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = retry_async(
            "test",
            3,
            Duration::from_millis(1),
            Duration::from_millis(2),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(EngineError::Timeout(Duration::from_secs(60))) }
            },
        )
        .await;
        assert!(matches!(result, Err(EngineError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
