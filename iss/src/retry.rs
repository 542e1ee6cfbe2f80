//! Bounded exponential-backoff retries for flaky network calls.

use std::future::Future;

use iss_config::shared::RetryConfig;
use tracing::{error, warn};

use crate::error::IssResult;

/// Runs `operation` until it succeeds or [`RetryConfig::max_attempts`] attempts failed.
///
/// After the n-th failed attempt (0-based) the task sleeps
/// `initial_delay * backoff_multiplier^n` before trying again, with no jitter. Every error
/// is retried the same way; callers that must not retry some kinds should classify before
/// calling this. Once attempts run out, the last error is returned unchanged.
///
/// A `max_attempts` of zero is treated as one attempt.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> IssResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = IssResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if attempt >= max_attempts {
            error!(
                operation = operation_name,
                attempts = attempt,
                error_kind = ?err.kind(),
                error = %err.description(),
                "giving up after the last attempt failed"
            );

            return Err(err);
        }

        let delay = config.delay_after_attempt(attempt - 1);
        warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error_kind = ?err.kind(),
            detail = err.detail().unwrap_or_default(),
            "attempt failed, retrying after backoff"
        );

        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    use iss_telemetry::tracing::init_test_tracing;
    use tokio::time::Instant;

    use super::*;
    use crate::error::{ErrorKind, IssError};
    use crate::iss_error;

    fn three_attempts() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_operation_runs_max_attempts_times() {
        init_test_tracing();

        let calls = Cell::new(0u32);
        let result: IssResult<()> = retry_with_backoff(&three_attempts(), "fetch", || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                Err(iss_error!(
                    ErrorKind::ApiRequestFailed,
                    "Position API request failed",
                    format!("attempt {attempt}")
                ))
            }
        })
        .await;

        assert_eq!(calls.get(), 3);

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiRequestFailed);
        assert_eq!(err.detail(), Some("attempt 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn delays_double_between_attempts() {
        let attempts_at = RefCell::new(Vec::new());
        let _: IssResult<()> = retry_with_backoff(&three_attempts(), "fetch", || {
            attempts_at.borrow_mut().push(Instant::now());
            async { Err(iss_error!(ErrorKind::ApiTimeout, "timeout")) }
        })
        .await;

        let attempts_at = attempts_at.into_inner();
        assert_eq!(attempts_at.len(), 3);
        assert_eq!(attempts_at[1] - attempts_at[0], Duration::from_secs(1));
        assert_eq!(attempts_at[2] - attempts_at[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn success_stops_retrying() {
        let calls = Cell::new(0u32);
        let started = Instant::now();

        let value = retry_with_backoff(&three_attempts(), "fetch", || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt < 2 {
                    Err::<u32, IssError>(iss_error!(
                        ErrorKind::ApiResponseInvalid,
                        "invalid body"
                    ))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.get(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let calls = Cell::new(0u32);
        let config = RetryConfig {
            max_attempts: 0,
            ..three_attempts()
        };

        let _: IssResult<()> = retry_with_backoff(&config, "fetch", || {
            calls.set(calls.get() + 1);
            async { Err(iss_error!(ErrorKind::ApiTimeout, "timeout")) }
        })
        .await;

        assert_eq!(calls.get(), 1);
    }
}
