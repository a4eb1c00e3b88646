//! Errors produced while waiting for a state change

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Error returned by a state refresh function
pub type RefreshError = Box<dyn std::error::Error + Send + Sync>;

/// Terminal failure of a wait
#[derive(Debug, Error)]
pub enum WaitError {
    /// The timeout elapsed before the resource reached a target state
    #[error(
        "timeout while waiting for {}{}{}",
        describe_expected(.expected),
        describe_progress(.last_state, .timeout),
        describe_last_error(.last_error)
    )]
    Timeout {
        timeout: Duration,
        last_state: String,
        expected: Vec<String>,
        last_error: Option<String>,
    },

    /// The resource reported a status that is neither pending nor target
    #[error(
        "unexpected state '{state}', wanted target '{}'{}",
        .expected.join(", "),
        describe_last_error(.last_error)
    )]
    UnexpectedState {
        state: String,
        expected: Vec<String>,
        last_error: Option<String>,
    },

    /// The resource could not be found after the allowed number of checks
    #[error("couldn't find resource ({retries} retries){}", describe_last_error(.last_error))]
    NotFound {
        retries: u32,
        last_error: Option<String>,
    },

    /// The refresh function itself failed
    #[error(transparent)]
    Refresh(RefreshError),

    /// The wait was cancelled by the caller
    #[error("wait cancelled")]
    Cancelled,

    /// A status was configured as both pending and target
    #[error("state '{state}' is configured as both pending and target")]
    OverlappingStates { state: String },
}

impl WaitError {
    /// Attach the remote failure reason found on the last snapshot.
    ///
    /// Only timeout, unexpected state and not found errors carry a last error;
    /// other variants are left untouched.
    pub fn set_last_error(&mut self, err: impl fmt::Display) {
        match self {
            Self::Timeout { last_error, .. }
            | Self::UnexpectedState { last_error, .. }
            | Self::NotFound { last_error, .. } => *last_error = Some(err.to_string()),
            _ => {}
        }
    }

    /// Builder form of [`WaitError::set_last_error`]
    pub fn with_last_error(mut self, err: impl fmt::Display) -> Self {
        self.set_last_error(err);
        self
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_unexpected_state(&self) -> bool {
        matches!(self, Self::UnexpectedState { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn describe_expected(expected: &[String]) -> String {
    if expected.is_empty() {
        "resource to be gone".to_string()
    } else {
        format!("state to become '{}'", expected.join(", "))
    }
}

fn describe_progress(last_state: &str, timeout: &Duration) -> String {
    let mut extra = Vec::new();
    if !last_state.is_empty() {
        extra.push(format!("last state: '{}'", last_state));
    }
    if !timeout.is_zero() {
        extra.push(format!("timeout: {:?}", timeout));
    }
    if extra.is_empty() {
        String::new()
    } else {
        format!(" ({})", extra.join(", "))
    }
}

fn describe_last_error(last_error: &Option<String>) -> String {
    match last_error {
        Some(err) => format!(": {}", err),
        None => String::new(),
    }
}

/// A failed wait together with the last snapshot the refresh function returned.
///
/// Waiters for resources that expose a failure reason inspect `last` and
/// enrich `error` before handing it on.
#[derive(Debug)]
pub struct StateChangeError<T> {
    pub error: WaitError,
    pub last: Option<T>,
}

impl<T> StateChangeError<T> {
    pub fn new(error: WaitError) -> Self {
        Self { error, last: None }
    }

    pub fn with_last(mut self, last: Option<T>) -> Self {
        self.last = last;
        self
    }

    pub fn into_parts(self) -> (WaitError, Option<T>) {
        (self.error, self.last)
    }
}

impl<T> fmt::Display for StateChangeError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<T: fmt::Debug> std::error::Error for StateChangeError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

impl<T> From<StateChangeError<T>> for WaitError {
    fn from(err: StateChangeError<T>) -> Self {
        err.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = WaitError::Timeout {
            timeout: Duration::from_secs(300),
            last_state: "creating".to_string(),
            expected: vec!["ready".to_string()],
            last_error: None,
        };
        assert_eq!(
            err.to_string(),
            "timeout while waiting for state to become 'ready' (last state: 'creating', timeout: 300s)"
        );
    }

    #[test]
    fn test_timeout_display_for_deletion() {
        let err = WaitError::Timeout {
            timeout: Duration::ZERO,
            last_state: String::new(),
            expected: vec![],
            last_error: None,
        };
        assert_eq!(err.to_string(), "timeout while waiting for resource to be gone");
    }

    #[test]
    fn test_set_last_error() {
        let mut err = WaitError::UnexpectedState {
            state: "failed".to_string(),
            expected: vec!["ready".to_string(), "running".to_string()],
            last_error: None,
        };
        err.set_last_error("endpoint unreachable");
        assert_eq!(
            err.to_string(),
            "unexpected state 'failed', wanted target 'ready, running': endpoint unreachable"
        );
    }

    #[test]
    fn test_set_last_error_ignores_cancelled() {
        let err = WaitError::Cancelled.with_last_error("ignored");
        assert_eq!(err.to_string(), "wait cancelled");
    }

    #[test]
    fn test_not_found_display() {
        let err = WaitError::NotFound {
            retries: 21,
            last_error: None,
        };
        assert_eq!(err.to_string(), "couldn't find resource (21 retries)");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_state_change_error_converts_to_wait_error() {
        let failure = StateChangeError::new(WaitError::Cancelled).with_last(Some(42));
        assert_eq!(failure.last, Some(42));
        let err: WaitError = failure.into();
        assert!(err.is_cancelled());
    }
}
