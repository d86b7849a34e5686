//! Connection Metrics Port
//!
//! The three instrumentation primitives recorded for outbound calls.

/// Sink for outbound connection metrics.
///
/// Recording is infallible from the caller's point of view; implementations
/// must not block.
pub trait ConnectionMetrics: Send + Sync {
    /// A request needed a freshly dialled connection.
    fn record_new_connection(&self);

    /// A request went out on a pooled connection.
    fn record_reused_connection(&self);

    /// Time spent preparing the connection (dns + tcp + tls), in milliseconds.
    fn observe_connection_preparation(&self, millis: f64);
}
