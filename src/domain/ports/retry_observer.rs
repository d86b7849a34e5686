//! Retry Observer Port
//!
//! One-way notification of intermediate retry failures.

use crate::domain::entities::Attempt;

/// Receives one event per failed attempt that is about to be retried.
///
/// Observers cannot influence the retry loop: there is no return value,
/// and a panicking observer is contained by the caller. The final attempt
/// is never reported since its outcome is returned to the caller.
pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, attempt: &Attempt);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRetryObserver;

impl RetryObserver for NoopRetryObserver {
    fn on_retry(&self, _attempt: &Attempt) {}
}
