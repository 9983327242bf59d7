//! Retry decisions and jittered exponential backoff.
//!
//! Only two things can trigger a retry: a transport error, or a completed
//! response with a 5xx status. Timeouts have no trigger and are never retried.

use crate::options::ResolvedOptions;
use http::StatusCode;
use rand::Rng;
use std::time::Duration;

/// Fraction of the delay used as symmetric jitter.
const JITTER: f64 = 0.2;

/// What went wrong on the attempt being considered for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTrigger {
    /// A connection-level failure.
    Transport,
    /// A completed response that was not followed as a redirect.
    Status(StatusCode),
}

/// Retry budget and backoff bounds for one call.
///
/// # Examples
///
/// ```
/// use courier::retry::{RetryPolicy, RetryTrigger};
/// use http::StatusCode;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_retries: 2,
///     base_delay: Duration::from_millis(100),
///     max_delay: Duration::from_millis(300),
/// };
///
/// assert!(policy.should_retry(RetryTrigger::Status(StatusCode::BAD_GATEWAY), 1));
/// assert!(!policy.should_retry(RetryTrigger::Status(StatusCode::NOT_FOUND), 0));
/// assert!(!policy.should_retry(RetryTrigger::Transport, 2));
///
/// // 100ms, 200ms, then capped at 300ms
/// assert_eq!(policy.backoff(2), Duration::from_millis(300));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts beyond the first.
    pub max_retries: usize,
    /// Delay before the first retry, doubled for every further one.
    pub base_delay: Duration,
    /// Upper bound for a single delay, before jitter.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Reads the policy from resolved call options.
    pub fn from_options(options: &ResolvedOptions) -> Self {
        Self {
            max_retries: options.max_retries,
            base_delay: options.base_retry_delay,
            max_delay: options.max_retry_delay,
        }
    }

    /// Returns `true` if `attempt` (numbered from 0) may be followed by another.
    pub fn should_retry(&self, trigger: RetryTrigger, attempt: usize) -> bool {
        let retryable = match trigger {
            RetryTrigger::Transport => true,
            RetryTrigger::Status(status) => status.is_server_error() || status.as_u16() >= 600,
        };
        retryable && attempt < self.max_retries
    }

    /// The un-jittered delay after `attempt`: `min(base * 2^attempt, max)`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let multiplier = u32::try_from(attempt)
            .ok()
            .and_then(|exp| 2u32.checked_pow(exp))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    /// The delay to wait after `attempt`, with ±20% jitter applied.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        jitter(self.backoff(attempt), &mut rand::thread_rng())
    }
}

fn jitter(delay: Duration, rng: &mut impl Rng) -> Duration {
    let offset = rng.gen_range(-JITTER..=JITTER);
    delay.mul_f64(1.0 + offset)
}
