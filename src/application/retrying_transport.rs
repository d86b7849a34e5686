//! Retrying Transport
//!
//! Runs the bounded attempt loop around an inner transport.

use crate::domain::entities::{Attempt, AttemptFailure, OutboundRequest, Response};
use crate::domain::errors::TransportError;
use crate::domain::ports::{NoopRetryObserver, RetryObserver, Transport};
use crate::domain::services::BackoffPolicy;
use crate::domain::value_objects::RetryConfig;
use async_trait::async_trait;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Transport that retries transient failures with exponential backoff.
///
/// Attempts within one call are strictly sequential. The retry budget is
/// fixed at construction, so concurrent callers sharing an instance all
/// see the same budget; no other state is shared between calls.
pub struct RetryingTransport<T> {
    inner: T,
    config: RetryConfig,
    backoff: BackoffPolicy,
    observer: Arc<dyn RetryObserver>,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            backoff: BackoffPolicy::default(),
            observer: Arc::new(NoopRetryObserver),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> RetryConfig {
        self.config
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    fn notify(&self, attempt: &Attempt) {
        let observer = &self.observer;
        if catch_unwind(AssertUnwindSafe(|| observer.on_retry(attempt))).is_err() {
            tracing::error!(attempt = attempt.number, "retry observer panicked, ignoring");
        }
    }

    async fn wait(&self, delay: Duration, request: &OutboundRequest) -> Result<(), TransportError> {
        match &request.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(TransportError::Cancelled),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn execute(&self, request: &OutboundRequest) -> Result<Response, TransportError> {
        let total = self.config.total_attempts();
        let mut attempt = 1;

        loop {
            if request.is_cancelled() {
                return Err(TransportError::Cancelled);
            }

            let outcome = self.inner.execute(request).await;

            if attempt >= total || !self.backoff.should_retry(&outcome) {
                if attempt > 1 {
                    tracing::debug!(attempt, total, "retry loop finished");
                }
                return outcome;
            }

            let failure = match &outcome {
                Ok(response) => AttemptFailure::Status(response.status),
                Err(err) => AttemptFailure::Transport(err.to_string()),
            };
            self.notify(&Attempt::new(attempt, failure));

            self.wait(self.backoff.delay_for(attempt), request).await?;
            attempt += 1;
        }
    }
}
