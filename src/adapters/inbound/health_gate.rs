//! Health Gate
//!
//! Lock-free boolean health endpoints for readiness and liveness checks.

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{on, MethodFilter, MethodRouter},
    Router,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable handle over one health flag.
///
/// All clones share the same flag. Reads and writes are single atomic
/// operations; concurrent writers resolve last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct HealthGate {
    state: Arc<AtomicBool>,
}

impl HealthGate {
    pub fn new(initial: bool) -> Self {
        Self {
            state: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn set(&self, up: bool) {
        self.state.store(up, Ordering::Release);
    }

    pub fn is_up(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }

    /// GET handler answering 200 `OK` while up, 503 otherwise.
    ///
    /// HEAD is not routed and gets 405 like any other method.
    pub fn handler<S>(&self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let gate = self.clone();
        on(MethodFilter::GET, move || {
            let up = gate.is_up();
            async move { gate_response(up) }
        })
    }
}

fn gate_response(up: bool) -> impl IntoResponse {
    if up {
        (StatusCode::OK, "OK")
    } else {
        let status = StatusCode::SERVICE_UNAVAILABLE;
        (status, status.canonical_reason().unwrap_or("Service Unavailable"))
    }
}

/// Create a gate and its handler.
pub fn health_gate<S>(initial: bool) -> (MethodRouter<S>, HealthGate)
where
    S: Clone + Send + Sync + 'static,
{
    let gate = HealthGate::new(initial);
    (gate.handler(), gate)
}

/// Mount readiness and liveness gates, both initially down.
///
/// Returns the router plus the `(ready, live)` handles.
pub fn readiness_liveness<S>(
    router: Router<S>,
    ready_path: &str,
    live_path: &str,
) -> (Router<S>, HealthGate, HealthGate)
where
    S: Clone + Send + Sync + 'static,
{
    let (ready_handler, ready) = health_gate(false);
    let (live_handler, live) = health_gate(false);
    let router = router
        .route(ready_path, ready_handler)
        .route(live_path, live_handler);
    (router, ready, live)
}
