//! Retry policy: when to try again and how long to wait.
//!
//! The policy is exponential backoff over a fixed base delay. Retries are
//! permitted for GET only; non-idempotent methods surface their first
//! failure immediately so a flaky network can never duplicate a write.

use crate::error::ApiError;
use http::Method;
use rand::Rng;
use std::time::Duration;

/// Decides whether a failed attempt is retried and computes the backoff.
///
/// The delay before retry `k` (1-indexed) is `base_delay * 2^(k-1)`, capped
/// at `max_delay`. A server-supplied `Retry-After` hint on the error
/// overrides the computed delay when it is larger.
///
/// `max_retries` counts retries after the initial attempt, so a call makes
/// at most `max_retries + 1` network attempts in total.
///
/// # Examples
///
/// ```
/// use steadfast::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_retries: 3,
///     base_delay: Duration::from_millis(500),
///     ..RetryPolicy::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Upper bound on any single computed backoff delay.
    pub max_delay: Duration,
    /// When `true`, each delay is scaled by a random factor in 50–100% to
    /// spread out retries from many clients.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns `true` if the failed attempt should be retried.
    ///
    /// # Arguments
    ///
    /// * `method` - The request method; only GET is retried.
    /// * `error` - The classified failure from the attempt.
    /// * `attempt` - The retry number being considered (1-indexed).
    pub fn should_retry(&self, method: &Method, error: &ApiError, attempt: usize) -> bool {
        *method == Method::GET && attempt <= self.max_retries && error.is_retryable()
    }

    /// Computes the wait before retry `attempt` (1-indexed), honoring any
    /// server-supplied hint on the error when it is larger.
    pub fn delay_for(&self, attempt: usize, error: &ApiError) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1) as u32);
        let mut delay = self.base_delay.saturating_mul(multiplier).min(self.max_delay);

        if let Some(hint) = error.retry_after {
            delay = delay.max(hint);
        }

        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay = delay.mul_f64(factor);
        }

        delay
    }
}
