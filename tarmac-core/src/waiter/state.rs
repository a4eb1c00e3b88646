//! StateChangeConf - Polling a remote resource until it reaches a target state
//!
//! A waiter repeatedly calls a refresh function, classifies the returned status
//! against the pending and target sets, and sleeps between polls with an
//! exponential backoff bounded below by `min_timeout`.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use super::error::{RefreshError, StateChangeError, WaitError};

/// Number of consecutive "not found" observations tolerated by default
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Default lower bound on the time between two polls
pub const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Default total wait budget
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Upper bound of the exponential backoff
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Poll intervals at or above this value are ignored in favour of backoff
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(180);

/// Result of one status lookup.
///
/// `Ok(Some((snapshot, status)))` when the resource was found,
/// `Ok(None)` when it does not exist, `Err` when the lookup itself failed.
pub type RefreshResult<T> = Result<Option<(T, String)>, RefreshError>;

/// Configuration of a single wait
pub struct StateChangeConf<F> {
    pending: Vec<String>,
    target: Vec<String>,
    refresh: F,
    timeout: Duration,
    delay: Duration,
    min_timeout: Duration,
    poll_interval: Option<Duration>,
    not_found_checks: Option<u32>,
    continuous_target_occurence: u32,
}

impl<F> StateChangeConf<F> {
    /// Create a waiter driven by `refresh`
    pub fn new<T, Fut>(refresh: F) -> Self
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshResult<T>>,
    {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            refresh,
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            min_timeout: DEFAULT_MIN_TIMEOUT,
            poll_interval: None,
            not_found_checks: None,
            continuous_target_occurence: 1,
        }
    }

    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = states.into_iter().map(Into::into).collect();
        self
    }

    /// Target states. An empty target means "wait until the resource is gone".
    pub fn target<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pause before the first poll
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Lower bound on the time between two polls
    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout.max(Duration::from_millis(1));
        self
    }

    /// Fixed time between polls, replacing the exponential backoff
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = Some(checks);
        self
    }

    pub fn continuous_target_occurence(mut self, occurences: u32) -> Self {
        self.continuous_target_occurence = occurences.max(1);
        self
    }

    /// Wait until the resource reaches a target state.
    ///
    /// Returns the snapshot observed in the target state, or `None` when the
    /// target is empty and the resource disappeared.
    pub async fn wait_for_state<T, Fut>(self) -> Result<Option<T>, StateChangeError<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshResult<T>>,
    {
        self.wait_for_state_until(std::future::pending::<()>())
            .await
    }

    /// Like [`StateChangeConf::wait_for_state`], but returns
    /// [`WaitError::Cancelled`] as soon as `cancel` completes.
    pub async fn wait_for_state_until<T, Fut, C>(
        mut self,
        cancel: C,
    ) -> Result<Option<T>, StateChangeError<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshResult<T>>,
        C: Future<Output = ()>,
    {
        if let Some(state) = self.pending.iter().find(|s| self.target.contains(s)) {
            return Err(StateChangeError::new(WaitError::OverlappingStates {
                state: state.clone(),
            }));
        }

        let timeout = self.timeout;
        let expected = self.target.clone();
        let mut progress = Progress::default();

        let outcome = {
            let poll = tokio::time::timeout(timeout, self.poll(&mut progress));
            tokio::select! {
                biased;
                () = cancel => None,
                outcome = poll => Some(outcome),
            }
        };

        match outcome {
            Some(Ok(Ok(()))) => Ok(progress.last),
            Some(Ok(Err(error))) => Err(StateChangeError::new(error).with_last(progress.last)),
            Some(Err(_elapsed)) => {
                log::debug!(
                    "timed out after {:?} waiting for {:?} (last state: {:?})",
                    timeout,
                    expected,
                    progress.state
                );
                let error = WaitError::Timeout {
                    timeout,
                    last_state: progress.state,
                    expected,
                    last_error: None,
                };
                Err(StateChangeError::new(error).with_last(progress.last))
            }
            None => Err(StateChangeError::new(WaitError::Cancelled).with_last(progress.last)),
        }
    }

    /// Run the poll loop until a terminal condition.
    ///
    /// On success the snapshot to return is left in `progress.last`.
    async fn poll<T, Fut>(&mut self, progress: &mut Progress<T>) -> Result<(), WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshResult<T>>,
    {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let not_found_checks = self.not_found_checks.unwrap_or(DEFAULT_NOT_FOUND_CHECKS);
        let absent_required = self
            .not_found_checks
            .unwrap_or(self.continuous_target_occurence)
            .max(1);

        let mut wait = Duration::ZERO;
        let mut target_streak = 0u32;
        let mut not_found = 0u32;

        loop {
            let observed = (self.refresh)().await.map_err(WaitError::Refresh)?;

            match observed {
                None => {
                    progress.last = None;
                    progress.state.clear();
                    target_streak = 0;
                    not_found += 1;

                    if self.target.is_empty() {
                        if not_found >= absent_required {
                            return Ok(());
                        }
                    } else if not_found > not_found_checks {
                        return Err(WaitError::NotFound {
                            retries: not_found,
                            last_error: None,
                        });
                    }
                }
                Some((snapshot, state)) => {
                    not_found = 0;
                    let is_target = self.target.contains(&state);
                    let is_pending = self.pending.contains(&state);

                    if state != progress.state {
                        log::debug!("state changed from {:?} to {:?}", progress.state, state);
                    }
                    progress.last = Some(snapshot);
                    progress.state = state;

                    if is_target {
                        target_streak += 1;
                        if target_streak >= self.continuous_target_occurence {
                            return Ok(());
                        }
                    } else if is_pending {
                        target_streak = 0;
                    } else {
                        return Err(WaitError::UnexpectedState {
                            state: progress.state.clone(),
                            expected: self.target.clone(),
                            last_error: None,
                        });
                    }
                }
            }

            wait = self.next_wait(wait, target_streak);
            log::trace!("waiting {:?} before next refresh", wait);
            sleep(wait).await;
        }
    }

    /// Exponential backoff, held steady while confirming a target state
    fn next_wait(&self, current: Duration, target_streak: u32) -> Duration {
        if let Some(interval) = self.poll_interval
            && !interval.is_zero()
            && interval < MAX_POLL_INTERVAL
        {
            return interval.max(self.min_timeout);
        }

        let wait = if target_streak == 0 {
            current.saturating_mul(2)
        } else {
            current
        };

        if wait < self.min_timeout {
            self.min_timeout
        } else if wait > MAX_BACKOFF {
            MAX_BACKOFF.max(self.min_timeout)
        } else {
            wait
        }
    }
}

/// What the poll loop has seen so far, kept outside the loop so it survives a timeout
struct Progress<T> {
    last: Option<T>,
    state: String,
}

impl<T> Default for Progress<T> {
    fn default() -> Self {
        Self {
            last: None,
            state: String::new(),
        }
    }
}
