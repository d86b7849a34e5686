//! Client Factory
//!
//! Builds the extended outbound client from configuration.

use crate::adapters::outbound::{ClientConfigError, ReqwestTransport};
use crate::application::{extend_transport, ExtendedTransport};
use crate::config::ClientConfig;
use crate::domain::ports::{ConnectionMetrics, RetryObserver};
use crate::domain::services::BackoffPolicy;
use crate::domain::value_objects::RetryConfig;
use std::sync::Arc;

/// Instrumented, retrying reqwest transport configured from `config`.
pub fn extended_http_client(
    config: &ClientConfig,
    metrics: Arc<dyn ConnectionMetrics>,
    observer: Arc<dyn RetryObserver>,
) -> Result<ExtendedTransport<ReqwestTransport>, ClientConfigError> {
    let transport = ReqwestTransport::from_config(config)?;
    tracing::debug!(
        "http client: timeout {:?} max retries {} max conns per host {}",
        config.timeout(),
        config.max_retries,
        config.max_conns_per_host
    );
    Ok(extend_transport(
        transport,
        RetryConfig::new(config.max_retries),
        BackoffPolicy::new(config.backoff_base(), config.backoff_max()),
        observer,
        metrics,
    ))
}
