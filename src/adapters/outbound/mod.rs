mod expvar_metrics_store;
mod retry_observers;
mod reqwest_transport;

pub use expvar_metrics_store::{
    Counter, ExpvarMetricsStore, Histogram, CONNECTION_PREPARATION, NEW_CONNECTIONS,
    REUSED_CONNECTIONS,
};
pub use reqwest_transport::{build_http_client, parse_pem_certificates, ClientConfigError, ReqwestTransport};
pub use retry_observers::{ChannelRetryObserver, TracingRetryObserver};
