/*!

A single retry primitive for the calls that talk to remote systems. Every retried operation uses a
[`RetryPolicy`]: a number of attempts and a fixed delay between them. The delay does not grow.

!*/

use crate::constants::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
use log::{debug, info};
use snafu::{ResultExt, Snafu};
use std::time::Duration;

/// How many times to try an operation and how long to wait between tries.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// A policy of zero attempts is treated as a single attempt.
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Blocks between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// The error returned by [`RetryRunner::execute`].
#[derive(Debug, Snafu)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Every attempt failed with a transient error. `source` is the error from the last attempt.
    #[snafu(display(
        "Exceeded max attempts {} for {}. Giving up!: {}",
        attempts,
        what,
        source
    ))]
    Exhausted {
        what: String,
        attempts: u32,
        source: E,
    },

    /// An attempt failed with an error that retrying cannot fix.
    #[snafu(display("Unable to retry {}: {}", what, source))]
    Fatal { what: String, source: E },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// The error from the final attempt.
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Fatal { source, .. } => source,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }
}

/// Runs fallible operations under a [`RetryPolicy`].
#[derive(Clone, Debug, Default)]
pub struct RetryRunner<S = ThreadSleeper> {
    sleeper: S,
}

impl<S: Sleeper> RetryRunner<S> {
    pub fn new(sleeper: S) -> Self {
        Self { sleeper }
    }

    /// Call `operation` until it succeeds, it fails with an error that `is_transient` rejects, or
    /// `policy` runs out of attempts. `what` describes the operation in log messages and errors.
    pub fn execute<T, E, C, F>(
        &self,
        what: &str,
        policy: &RetryPolicy,
        is_transient: C,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        C: Fn(&E) -> bool,
        F: FnMut() -> Result<T, E>,
    {
        let max_attempts = policy.max_attempts();
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(e) if !is_transient(&e) => {
                    debug!("Attempt {} of {} failed and cannot be retried: {}", attempt, what, e);
                    return Err(e).context(FatalSnafu { what });
                }
                Err(e) if attempt < max_attempts => {
                    info!(
                        "Attempt {}/{} of {} failed. Sleeping for {}s...: {}",
                        attempt,
                        max_attempts,
                        what,
                        policy.delay().as_secs(),
                        e
                    );
                    self.sleeper.sleep(policy.delay());
                    attempt += 1;
                }
                Err(e) => {
                    debug!("Exceeded max attempts {} for {}!: {}", max_attempts, what, e);
                    return Err(e).context(ExhaustedSnafu {
                        what,
                        attempts: max_attempts,
                    });
                }
            }
        }
    }
}
