//! Retry - Bounded retry of remote mutations on transient errors
//!
//! Retries are driven by the waiter engine: a successful call is the target
//! state, a retryable failure keeps the wait pending and anything else ends it.

use std::future::Future;
use std::time::Duration;

use crate::waiter::{RefreshError, StateChangeConf, WaitError};

const STATUS_SUCCESS: &str = "success";
const STATUS_RETRYABLE: &str = "retryableerror";
const STATUS_QUIT: &str = "quit";

/// Minimum spacing between two attempts
pub const RETRY_MIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Failure of one attempt, classified by the caller
#[derive(Debug)]
pub enum RetryError<E> {
    /// Try the same call again later
    Retryable(E),
    /// Stop and return this error as is
    NonRetryable(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Retryable(err) | Self::NonRetryable(err) => err,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Call `f` until it succeeds, fails with a non-retryable error, or `timeout`
/// elapses.
///
/// On timeout the last retryable error is returned when there is one.
pub async fn retry<T, E, F, Fut>(timeout: Duration, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
    E: From<WaitError>,
{
    retry_until(timeout, f, std::future::pending::<()>()).await
}

/// Like [`retry`], but gives up with [`WaitError::Cancelled`] once `cancel`
/// completes.
pub async fn retry_until<T, E, F, Fut, C>(timeout: Duration, f: F, cancel: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
    E: From<WaitError>,
    C: Future<Output = ()>,
{
    run_retry(timeout, f, cancel).await.map_err(Failure::into_error)
}

/// Call `f` while `is_retryable` accepts its error.
///
/// Once `timeout` has elapsed `f` is called one final time and that result is
/// returned, whatever it is.
pub async fn retry_when<T, E, F, Fut, P>(
    timeout: Duration,
    mut f: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: From<WaitError>,
{
    let outcome = {
        let is_retryable = &is_retryable;
        let attempt = || {
            let fut = f();
            async move {
                fut.await.map_err(|err| {
                    if is_retryable(&err) {
                        RetryError::Retryable(err)
                    } else {
                        RetryError::NonRetryable(err)
                    }
                })
            }
        };
        run_retry(timeout, attempt, std::future::pending::<()>()).await
    };

    match outcome {
        Ok(value) => Ok(value),
        Err(failure) if failure.error.is_timeout() => {
            log::debug!("retry timed out after {:?}, making a final attempt", timeout);
            f().await
        }
        Err(failure) => Err(failure.into_error()),
    }
}

/// A retry that ended without success
struct Failure<E> {
    error: WaitError,
    last: Option<E>,
}

impl<E: From<WaitError>> Failure<E> {
    /// The operation's own error wins over a timeout
    fn into_error(self) -> E {
        match self.last {
            Some(err) if !self.error.is_cancelled() => err,
            _ => E::from(self.error),
        }
    }
}

async fn run_retry<T, E, F, Fut, C>(timeout: Duration, mut f: F, cancel: C) -> Result<T, Failure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
    C: Future<Output = ()>,
{
    let refresh = move || {
        let fut = f();
        async move {
            let (snapshot, status) = match fut.await {
                Ok(value) => (Ok(value), STATUS_SUCCESS),
                Err(RetryError::Retryable(err)) => {
                    log::warn!("retryable error, retrying");
                    (Err(err), STATUS_RETRYABLE)
                }
                Err(RetryError::NonRetryable(err)) => (Err(err), STATUS_QUIT),
            };
            Ok::<_, RefreshError>(Some((snapshot, status.to_string())))
        }
    };

    let result = StateChangeConf::new(refresh)
        .pending([STATUS_RETRYABLE])
        .target([STATUS_SUCCESS])
        .timeout(timeout)
        .min_timeout(RETRY_MIN_TIMEOUT)
        .wait_for_state_until(cancel)
        .await;

    match result {
        Ok(Some(Ok(value))) => Ok(value),
        Ok(Some(Err(err))) => Err(Failure {
            error: WaitError::UnexpectedState {
                state: STATUS_QUIT.to_string(),
                expected: vec![STATUS_SUCCESS.to_string()],
                last_error: None,
            },
            last: Some(err),
        }),
        Ok(None) => Err(Failure {
            error: WaitError::NotFound {
                retries: 0,
                last_error: None,
            },
            last: None,
        }),
        Err(failure) => {
            let (error, last) = failure.into_parts();
            Err(Failure {
                error,
                last: last.and_then(Result::err),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Throttled,
        Denied(String),
        Wait(String),
    }

    impl From<WaitError> for TestError {
        fn from(err: WaitError) -> Self {
            TestError::Wait(err.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, TestError> = retry(Duration::from_secs(60), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(RetryError::Retryable(TestError::Throttled))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_returns_non_retryable_error_unmodified() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry(Duration::from_secs(60), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RetryError::NonRetryable(TestError::Denied("no".to_string()))) }
        })
        .await;

        assert_eq!(result, Err(TestError::Denied("no".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_timeout_returns_last_error() {
        let result: Result<(), TestError> = retry(Duration::from_secs(5), || async {
            Err(RetryError::Retryable(TestError::Throttled))
        })
        .await;

        assert_eq!(result, Err(TestError::Throttled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cancelled() {
        let cancel = tokio::time::sleep(Duration::from_secs(2));
        let result: Result<(), TestError> = retry_until(
            Duration::from_secs(60),
            || async { Err(RetryError::Retryable(TestError::Throttled)) },
            cancel,
        )
        .await;

        assert_eq!(result, Err(TestError::Wait("wait cancelled".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_makes_final_attempt_after_timeout() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<u32, TestError> = retry_when(
            Duration::from_secs(3),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let elapsed = start.elapsed();
                async move {
                    if elapsed < Duration::from_secs(3) {
                        Err(TestError::Throttled)
                    } else {
                        Ok(n)
                    }
                }
            },
            |err| *err == TestError::Throttled,
        )
        .await;

        let total = calls.load(Ordering::SeqCst);
        assert_eq!(result, Ok(total));
        assert!(total > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_when_stops_on_unclassified_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry_when(
            Duration::from_secs(30),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Denied("forbidden".to_string())) }
            },
            |err| *err == TestError::Throttled,
        )
        .await;

        assert_eq!(result, Err(TestError::Denied("forbidden".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
