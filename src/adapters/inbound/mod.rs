mod health_gate;
mod http_server;
mod metrics_endpoint;
pub mod middleware;

pub use health_gate::{health_gate, readiness_liveness, HealthGate};
pub use http_server::{listen_and_serve, ServerError, ShutdownCoordinator, DEFAULT_SHUTDOWN_TIMEOUT};
pub use metrics_endpoint::metrics_route;
pub use middleware::{json_content_type, request_context, REQUEST_ID_HEADER};
