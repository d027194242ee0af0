//! Backoff and retry for page fetches.
//!
//! Throttling (429), server errors (5xx) and transport failures are retried;
//! a missing page or a blank body fails the same way every time and is
//! returned as is.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Upper bound on a server-provided `Retry-After` delay.
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Whether another attempt could plausibly succeed: 429, any transport
/// error, or a 5xx status.
fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } | ScraperError::Http(_) => true,
        ScraperError::UnexpectedStatus { status, .. } => (500..600).contains(status),
        _ => false,
    }
}

/// Seconds to sleep before retry number `attempt + 1`.
///
/// `backoff_base_secs * 2^attempt`, raised to the server's `Retry-After`
/// when that is longer (capped at [`MAX_RETRY_AFTER_SECS`]).
fn backoff_delay_secs(err: &ScraperError, backoff_base_secs: u64, attempt: u32) -> u64 {
    // Cap the shift to prevent overflow on extreme configs.
    let exponential = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
    match err {
        ScraperError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } => exponential.max((*secs).min(MAX_RETRY_AFTER_SECS)),
        _ => exponential,
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// `max_retries` extra attempts have been spent.
///
/// Each retry waits [`backoff_delay_secs`]: with a base of 1s the waits are
/// 1s, 2s, 4s and so on. The last error is returned once attempts run out,
/// so `max_retries = 2` means three requests at most.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay_secs = backoff_delay_secs(&err, backoff_base_secs, attempt);
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited(retry_after_secs: Option<u64>) -> ScraperError {
        ScraperError::RateLimited {
            domain: "loja.example.com".to_owned(),
            retry_after_secs,
        }
    }

    fn status(status: u16) -> ScraperError {
        ScraperError::UnexpectedStatus {
            status,
            url: "https://loja.example.com/p/1".to_owned(),
        }
    }

    /// Runs `retry_with_backoff` with zero backoff; `respond` maps the
    /// zero-based call number to a result. Returns the result and call count.
    async fn run_counted(
        max_retries: u32,
        respond: impl Fn(u32) -> Result<u32, ScraperError>,
    ) -> (Result<u32, ScraperError>, u32) {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(max_retries, 0, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let outcome = respond(n);
            async move { outcome }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn first_success_is_returned_without_retry() {
        let (result, calls) = run_counted(3, |_| Ok(42)).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retries_on_server_error_then_succeeds() {
        let (result, calls) =
            run_counted(3, |n| if n < 2 { Err(status(503)) } else { Ok(99) }).await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn gives_up_with_last_error_once_retries_are_spent() {
        let (result, calls) = run_counted(2, |_| Err(rate_limited(None))).await;
        assert_eq!(calls, 3);
        assert!(matches!(result, Err(ScraperError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let (result, calls) = run_counted(3, |_| {
            Err(ScraperError::NotFound {
                url: "https://loja.example.com/p/1".to_owned(),
                status: 404,
            })
        })
        .await;
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(ScraperError::NotFound { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_client_error_status() {
        let (result, calls) = run_counted(3, |_| Err(status(403))).await;
        assert_eq!(calls, 1);
        assert!(matches!(
            result,
            Err(ScraperError::UnexpectedStatus { status: 403, .. })
        ));
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let err = status(500);
        assert_eq!(backoff_delay_secs(&err, 1, 0), 1);
        assert_eq!(backoff_delay_secs(&err, 1, 1), 2);
        assert_eq!(backoff_delay_secs(&err, 3, 2), 12);
    }

    #[test]
    fn retry_after_is_a_lower_bound() {
        assert_eq!(backoff_delay_secs(&rate_limited(Some(5)), 1, 0), 5);
        assert_eq!(backoff_delay_secs(&rate_limited(Some(1)), 4, 1), 8);
        assert_eq!(backoff_delay_secs(&rate_limited(None), 1, 0), 1);
    }

    #[test]
    fn retry_after_is_capped() {
        assert_eq!(
            backoff_delay_secs(&rate_limited(Some(3600)), 1, 0),
            MAX_RETRY_AFTER_SECS
        );
    }

    #[test]
    fn extreme_attempt_does_not_overflow() {
        assert_eq!(backoff_delay_secs(&status(502), 4, 100), u64::MAX);
    }
}
