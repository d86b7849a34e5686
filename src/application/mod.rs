//! Application Layer
//!
//! Transport decorators and the API client built on top of them.

pub mod api_client;
pub mod instrumented_transport;
pub mod retrying_transport;

pub use api_client::{ApiClient, ApiClientError, ApiResponse};
pub use instrumented_transport::InstrumentedTransport;
pub use retrying_transport::RetryingTransport;

use crate::domain::ports::{ConnectionMetrics, RetryObserver, Transport};
use crate::domain::services::BackoffPolicy;
use crate::domain::value_objects::RetryConfig;
use std::sync::Arc;

/// The full outbound stack: instrumentation per logical call around the
/// retry loop around `T`.
pub type ExtendedTransport<T> = InstrumentedTransport<RetryingTransport<T>>;

/// Wrap `inner` with retries and instrumentation.
///
/// Instrumentation is always the outermost layer, so metrics count
/// logical calls rather than individual attempts.
pub fn extend_transport<T: Transport>(
    inner: T,
    retry: RetryConfig,
    backoff: BackoffPolicy,
    observer: Arc<dyn RetryObserver>,
    metrics: Arc<dyn ConnectionMetrics>,
) -> ExtendedTransport<T> {
    let retrying = RetryingTransport::new(inner, retry)
        .with_backoff(backoff)
        .with_observer(observer);
    InstrumentedTransport::new(retrying, metrics)
}
