//! svc-http
//!
//! HTTP plumbing for internal services: a retrying, instrumented outbound
//! client and an inbound server with health gates and graceful shutdown.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::{
    health_gate, listen_and_serve, readiness_liveness, HealthGate, ServerError, ShutdownCoordinator,
};
pub use adapters::outbound::{ExpvarMetricsStore, ReqwestTransport, TracingRetryObserver};
pub use application::{ApiClient, InstrumentedTransport, RetryingTransport};
pub use config::{load_config, ClientConfig, Config};
pub use domain::ports::{ConnectionMetrics, RetryObserver, Transport};
pub use domain::services::BackoffPolicy;
pub use domain::{OutboundRequest, Response, RetryConfig, TransportError};
pub use infrastructure::extended_http_client;
