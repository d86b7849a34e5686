//! Retry Observers
//!
//! Sinks for intermediate retry failures.

use crate::domain::entities::Attempt;
use crate::domain::ports::RetryObserver;
use tokio::sync::mpsc;

/// Logs every intermediate failure at WARN.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRetryObserver;

impl RetryObserver for TracingRetryObserver {
    fn on_retry(&self, attempt: &Attempt) {
        tracing::warn!("attempt:{} retrying: {}", attempt.number, attempt.failure);
    }
}

/// Forwards every intermediate failure into a channel.
///
/// Sends to a closed receiver are dropped.
#[derive(Debug, Clone)]
pub struct ChannelRetryObserver {
    tx: mpsc::UnboundedSender<Attempt>,
}

impl ChannelRetryObserver {
    pub fn new(tx: mpsc::UnboundedSender<Attempt>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Attempt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl RetryObserver for ChannelRetryObserver {
    fn on_retry(&self, attempt: &Attempt) {
        let _ = self.tx.send(attempt.clone());
    }
}
