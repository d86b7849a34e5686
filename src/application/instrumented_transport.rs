//! Instrumented Transport
//!
//! Records connection metrics for every call passing through it.

use crate::domain::entities::{OutboundRequest, Response};
use crate::domain::errors::TransportError;
use crate::domain::ports::{ConnectionMetrics, Transport};
use async_trait::async_trait;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Transport wrapper that records connection metrics before delegating.
///
/// Every call is counted as a reused connection with zero preparation
/// time. Genuine new-vs-reused detection is not wired up, so the new
/// connection counter is never incremented here. This is a known gap
/// kept for compatibility with existing dashboards.
///
/// When this wraps a [`RetryingTransport`](super::RetryingTransport) the
/// metrics are per logical call; wrapping the other way round would
/// record once per attempt.
pub struct InstrumentedTransport<T> {
    inner: T,
    metrics: Arc<dyn ConnectionMetrics>,
}

impl<T: Transport> InstrumentedTransport<T> {
    pub fn new(inner: T, metrics: Arc<dyn ConnectionMetrics>) -> Self {
        Self { inner, metrics }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn record(&self) {
        let metrics = &self.metrics;
        let recorded = catch_unwind(AssertUnwindSafe(|| {
            metrics.record_reused_connection();
            metrics.observe_connection_preparation(0.0);
        }));
        if recorded.is_err() {
            tracing::debug!("connection metrics recording failed, ignoring");
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for InstrumentedTransport<T> {
    async fn execute(&self, request: &OutboundRequest) -> Result<Response, TransportError> {
        self.record();
        self.inner.execute(request).await
    }
}
