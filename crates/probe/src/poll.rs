//! Bounded retry-until-condition polling

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{E2eError, E2eResult};

/// Default attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay between attempts
pub const DEFAULT_POLL_DELAY_MS: u64 = 1000;

/// Samples a condition up to `max_attempts` times with a fixed delay between
/// samples. The delay never precedes the first sample or follows the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    max_attempts: u32,
    delay: Duration,
}

/// What a poll ended with. Running out of attempts is not an error by
/// itself; callers decide with [`PollOutcome::into_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Satisfied { value: T, attempts: u32 },
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Satisfied { attempts, .. } | PollOutcome::TimedOut { attempts } => *attempts,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }

    pub fn value(self) -> Option<T> {
        match self {
            PollOutcome::Satisfied { value, .. } => Some(value),
            PollOutcome::TimedOut { .. } => None,
        }
    }

    /// Treat running out of attempts as fatal
    pub fn into_result(self, what: &str) -> E2eResult<T> {
        match self {
            PollOutcome::Satisfied { value, .. } => Ok(value),
            PollOutcome::TimedOut { attempts } => Err(E2eError::PollTimeout {
                what: what.to_string(),
                attempts,
            }),
        }
    }
}

impl Poller {
    /// A budget of zero attempts is raised to one
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Manual cursor for loops that act between samples
    pub fn attempts(&self) -> Attempts {
        Attempts {
            max: self.max_attempts,
            delay: self.delay,
            taken: 0,
        }
    }

    /// Run `sample` until it yields `Some`, the budget runs out, or it fails
    /// with a non-transient error.
    ///
    /// `sample` receives the 1-based attempt number.
    pub async fn poll<T, F, Fut>(&self, what: &str, mut sample: F) -> E2eResult<PollOutcome<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = E2eResult<Option<T>>>,
    {
        let mut attempts = self.attempts();
        while let Some(attempt) = attempts.next().await {
            if let Some(value) = attempts.absorb(what, sample(attempt).await)? {
                debug!(what, attempt, "condition met");
                return Ok(PollOutcome::Satisfied { value, attempts: attempt });
            }
        }

        debug!(what, attempts = attempts.taken(), "condition never met");
        Ok(PollOutcome::TimedOut {
            attempts: attempts.taken(),
        })
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::from_millis(DEFAULT_POLL_DELAY_MS))
    }
}

/// Attempt counter handed out by [`Poller::attempts`]
#[derive(Debug)]
pub struct Attempts {
    max: u32,
    delay: Duration,
    taken: u32,
}

impl Attempts {
    /// Start the next attempt, sleeping first unless it is the first one.
    /// Returns `None` once the budget is spent.
    pub async fn next(&mut self) -> Option<u32> {
        if self.taken >= self.max {
            return None;
        }
        if self.taken > 0 && !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.taken += 1;
        Some(self.taken)
    }

    pub fn taken(&self) -> u32 {
        self.taken
    }

    pub fn is_final(&self) -> bool {
        self.taken >= self.max
    }

    /// Apply the transient-error rule to one sample: transient failures count
    /// as "not met" unless this was the last attempt.
    pub fn absorb<T>(&self, what: &str, sample: E2eResult<Option<T>>) -> E2eResult<Option<T>> {
        match sample {
            Ok(value) => Ok(value),
            Err(e) if e.is_transient() && !self.is_final() => {
                warn!(what, attempt = self.taken, "transient error while polling: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
