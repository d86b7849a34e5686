//! Diagnostics endpoint exporting the metrics store as JSON.

use crate::adapters::outbound::ExpvarMetricsStore;
use axum::{routing::get, Json, Router};
use std::sync::Arc;

/// Mount a GET route at `path` serving the store's JSON snapshot.
pub fn metrics_route<S>(router: Router<S>, path: &str, store: Arc<ExpvarMetricsStore>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route(
        path,
        get(move || {
            let snapshot = store.snapshot();
            async move { Json(snapshot) }
        }),
    )
}
