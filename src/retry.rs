use std::{fmt::Display, future::Future, time::Duration};

use bon::Builder;

use crate::{clock::Clock, prelude::*};

/// How long and how often a failing operation is re-invoked.
///
/// At least one of `max_attempts` and `max_elapsed` should be set: a policy without any
/// budget makes exactly one attempt.
#[must_use]
#[derive(Copy, Clone, Debug, Builder)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    max_attempts: Option<u32>,

    /// Wall-clock budget measured from the start of the first attempt.
    max_elapsed: Option<Duration>,

    #[builder(default = Duration::from_secs(1))]
    initial_delay: Duration,

    #[builder(default)]
    backoff: Backoff,

    /// Upper bound for a single delay between attempts.
    max_delay: Option<Duration>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Backoff {
    Constant,

    /// Double the delay after every failed attempt.
    #[default]
    Exponential,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::deadline(Duration::from_secs(30))
    }
}

impl RetryPolicy {
    /// Fail fast: make one attempt and return its error.
    pub const fn none() -> Self {
        Self {
            max_attempts: Some(1),
            max_elapsed: None,
            initial_delay: Duration::ZERO,
            backoff: Backoff::Constant,
            max_delay: None,
        }
    }

    /// Exponential backoff starting at one second, bounded by the total elapsed time.
    pub const fn deadline(max_elapsed: Duration) -> Self {
        Self {
            max_attempts: None,
            max_elapsed: Some(max_elapsed),
            initial_delay: Duration::from_secs(1),
            backoff: Backoff::Exponential,
            max_delay: None,
        }
    }

    /// Pause before the next attempt, or `None` when the budget is exhausted.
    fn next_pause(&self, n_attempts: u32, elapsed: Duration, delay: Duration) -> Option<Duration> {
        if self.max_attempts.is_none() && self.max_elapsed.is_none() {
            return None;
        }
        if let Some(max_attempts) = self.max_attempts
            && n_attempts >= max_attempts
        {
            return None;
        }
        match self.max_elapsed {
            Some(max_elapsed) if elapsed >= max_elapsed => None,
            Some(max_elapsed) => Some(delay.min(max_elapsed - elapsed)),
            None => Some(delay),
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let delay = match self.backoff {
            Backoff::Constant => delay,
            Backoff::Exponential => delay.saturating_mul(2),
        };
        self.max_delay.map_or(delay, |max_delay| delay.min(max_delay))
    }
}

/// Re-invoke `operation` until it succeeds or the policy gives up.
///
/// The last error is returned unchanged. The deadline is checked against `clock`, which
/// must be monotonic, and no pause ever extends past the deadline.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, clock: &dyn Clock, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let started_at = clock.now();
    let mut delay = policy.max_delay.map_or(policy.initial_delay, |max| policy.initial_delay.min(max));
    let mut n_attempts = 0;

    loop {
        n_attempts += 1;
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        let elapsed = clock.now().saturating_duration_since(started_at);
        let Some(pause) = policy.next_pause(n_attempts, elapsed, delay) else {
            return Err(error);
        };
        warn!(n_attempts, ?elapsed, ?pause, "retrying due to error: {error}");
        clock.sleep(pause).await;
        delay = policy.next_delay(delay);
    }
}
