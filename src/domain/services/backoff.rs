//! Backoff Policy
//!
//! Pure retry decisions: how long to wait before the next attempt, and
//! whether an attempt's outcome is worth retrying at all.

use crate::domain::entities::Response;
use crate::domain::errors::TransportError;
use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;

/// Exponential backoff with additive jitter.
///
/// The wait after attempt `n` is `min(base * 2^(n-1), max)` plus a random
/// amount in `[0, delay / 3]`, so concurrent callers that failed together
/// spread out instead of retrying in lockstep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the second attempt (without jitter)
    pub base_delay: Duration,
    /// Upper bound for the deterministic part of the delay
    pub max_delay: Duration,
    /// Treat 429 Too Many Requests as retryable
    pub retry_on_too_many_requests: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_on_too_many_requests: false,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    pub fn with_retry_on_too_many_requests(mut self, enabled: bool) -> Self {
        self.retry_on_too_many_requests = enabled;
        self
    }

    /// Deterministic part of the delay after attempt `attempt` (1-indexed).
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay to wait after attempt `attempt` before the next one.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        delay + Self::jitter(delay)
    }

    fn jitter(delay: Duration) -> Duration {
        let max_jitter = (delay / 3).as_nanos().min(u64::MAX as u128) as u64;
        if max_jitter == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(0..=max_jitter))
    }

    /// Whether a status code warrants another attempt.
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        status.is_server_error()
            || (self.retry_on_too_many_requests && status == StatusCode::TOO_MANY_REQUESTS)
    }

    /// Whether the outcome of an attempt warrants another attempt.
    pub fn should_retry(&self, outcome: &Result<Response, TransportError>) -> bool {
        match outcome {
            Ok(response) => self.is_retryable_status(response.status),
            Err(err) => err.is_retryable(),
        }
    }
}
