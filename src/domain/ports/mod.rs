mod connection_metrics;
mod retry_observer;
mod transport;

pub use connection_metrics::ConnectionMetrics;
pub use retry_observer::{NoopRetryObserver, RetryObserver};
pub use transport::Transport;
