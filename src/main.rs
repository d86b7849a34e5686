//! svc-http - example service wiring the inbound and outbound stacks
//!
//! This is the composition root.

use std::sync::Arc;
use svc_http::adapters::inbound::{metrics_route, readiness_liveness, request_context, HealthGate};
use svc_http::adapters::outbound::{ExpvarMetricsStore, TracingRetryObserver};
use svc_http::domain::ports::Transport;
use svc_http::{extended_http_client, load_config, OutboundRequest, ShutdownCoordinator};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config()?;

    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!("starting svc-http listen={}", cfg.listen_addr);

    // 1. Outbound: metrics store and extended client
    let metrics = Arc::new(ExpvarMetricsStore::new());
    let client = Arc::new(extended_http_client(
        &cfg.client,
        metrics.clone(),
        Arc::new(TracingRetryObserver),
    )?);

    // 2. Inbound: health gates, diagnostics, middleware
    let (router, ready, live) =
        readiness_liveness(axum::Router::new(), &cfg.ready_path, &cfg.live_path);
    let router = metrics_route(router, &cfg.metrics_path, metrics).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(request_context)),
    );

    live.set(true);
    match cfg.upstream_url.clone() {
        Some(url) => {
            tokio::spawn(check_upstream(client, url, ready));
        }
        None => ready.set(true),
    }

    // 3. Serve until SIGINT/SIGTERM
    ShutdownCoordinator::new(cfg.shutdown_timeout())
        .run(&cfg.listen_addr, router)
        .await?;

    Ok(())
}

/// Mark the service ready once the upstream dependency answers.
async fn check_upstream(client: Arc<dyn Transport>, url: String, ready: HealthGate) {
    let request = match OutboundRequest::get(&url) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("invalid upstream url {}: {}", url, e);
            return;
        }
    };

    match client.execute(&request).await {
        Ok(resp) if resp.is_success() => {
            tracing::info!("upstream {} reachable, marking ready", url);
            ready.set(true);
        }
        Ok(resp) => tracing::error!("upstream {} answered {}, staying unready", url, resp.status),
        Err(e) => tracing::error!("upstream {} unreachable: {}, staying unready", url, e),
    }
}
