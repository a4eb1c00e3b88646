//! Waiter - Suspending a task until a remote resource settles
//!
//! [`StateChangeConf`] is the general engine. [`wait_until`] is a thin layer
//! over it for checks that only answer "done yet?".

mod error;
mod state;

use std::future::Future;
use std::time::Duration;

pub use error::{RefreshError, StateChangeError, WaitError};
pub use state::{
    DEFAULT_MIN_TIMEOUT, DEFAULT_NOT_FOUND_CHECKS, DEFAULT_TIMEOUT, RefreshResult,
    StateChangeConf,
};

const STATUS_FALSE: &str = "false";
const STATUS_TRUE: &str = "true";

/// Tuning for [`wait_until`]
#[derive(Debug, Clone)]
pub struct WaitOpts {
    /// Consecutive `true` answers required
    pub continuous_target_occurence: u32,
    pub delay: Duration,
    pub min_timeout: Duration,
    pub poll_interval: Option<Duration>,
}

impl Default for WaitOpts {
    fn default() -> Self {
        Self {
            continuous_target_occurence: 1,
            delay: Duration::ZERO,
            min_timeout: DEFAULT_MIN_TIMEOUT,
            poll_interval: None,
        }
    }
}

/// Poll `check` until it answers `true` `opts.continuous_target_occurence`
/// times in a row, or `timeout` elapses.
pub async fn wait_until<F, Fut>(
    timeout: Duration,
    mut check: F,
    opts: WaitOpts,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, RefreshError>>,
{
    let refresh = move || {
        let fut = check();
        async move {
            let done = fut.await?;
            let status = if done { STATUS_TRUE } else { STATUS_FALSE };
            Ok::<_, RefreshError>(Some(((), status.to_string())))
        }
    };

    let mut conf = StateChangeConf::new(refresh)
        .pending([STATUS_FALSE])
        .target([STATUS_TRUE])
        .timeout(timeout)
        .delay(opts.delay)
        .min_timeout(opts.min_timeout)
        .continuous_target_occurence(opts.continuous_target_occurence);
    if let Some(interval) = opts.poll_interval {
        conf = conf.poll_interval(interval);
    }

    conf.wait_for_state().await.map(|_| ()).map_err(WaitError::from)
}
