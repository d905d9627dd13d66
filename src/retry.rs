//! Retry state machine and backoff policy for market requests
//!
//! A fetch moves through `Attempting(n)` → `Backoff { .. }` → `Attempting(n + 1)`
//! until it succeeds or reaches `Exhausted`. The delay chosen for each backoff
//! is a pure function of the attempt number and the kind of failure.

use crate::constants::{MAX_RETRY_ATTEMPTS, RATE_LIMIT_DELAY_MS, RETRY_DELAY_MS};
use std::time::Duration;

/// How an attempt failed, as far as the backoff policy cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The market throttled us (HTTP 429)
    RateLimited,
    /// Anything else: bad status, timeout, transport or parse failure
    Other,
}

/// Linear backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per fetch, at least 1
    pub max_attempts: u32,
    /// Base delay after an ordinary failure
    pub retry_delay: Duration,
    /// Base delay after a rate-limited response
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            rate_limit_delay: Duration::from_millis(RATE_LIMIT_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempt` (1-based) failed with `kind`
    pub fn backoff(&self, attempt: u32, kind: FailureKind) -> Duration {
        let base = match kind {
            FailureKind::RateLimited => self.rate_limit_delay,
            FailureKind::Other => self.retry_delay,
        };
        base.saturating_mul(attempt.max(1))
    }
}

/// Where a fetch currently is in its retry sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// About to issue attempt `n` (1-based)
    Attempting(u32),
    /// Waiting `delay` before the attempt after `attempt`
    Backoff { attempt: u32, delay: Duration },
    /// No attempts left
    Exhausted,
}

impl RetryState {
    /// Initial state of every fetch
    pub fn start() -> Self {
        RetryState::Attempting(1)
    }

    /// Transition taken when the current attempt fails
    ///
    /// The final attempt goes straight to `Exhausted`, without a backoff.
    pub fn on_failure(self, policy: &RetryPolicy, kind: FailureKind) -> Self {
        match self {
            RetryState::Attempting(n) if n >= policy.max_attempts => RetryState::Exhausted,
            RetryState::Attempting(n) => RetryState::Backoff {
                attempt: n,
                delay: policy.backoff(n, kind),
            },
            other => other,
        }
    }

    /// Transition taken once a backoff delay has elapsed
    pub fn after_backoff(self) -> Self {
        match self {
            RetryState::Backoff { attempt, .. } => RetryState::Attempting(attempt + 1),
            other => other,
        }
    }
}
