//! Inbound Middleware
//!
//! Request-id propagation and JSON content-type defaulting, applied with
//! `axum::middleware::from_fn`.

use axum::{
    extract::Request,
    http::{header::CONTENT_TYPE, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensure every request carries an `X-Request-ID`, generating one when
/// absent, and echo it on the response.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let existing = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|id| !id.is_empty())
        .cloned();
    let request_id = match existing {
        Some(id) => id,
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            request
                .headers_mut()
                .insert(REQUEST_ID_HEADER, generated.clone());
            generated
        }
    };

    tracing::debug!(
        "incoming request {} {} {}",
        request.method(),
        request.uri(),
        request_id.to_str().unwrap_or_default()
    );

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}

/// Default the response `Content-Type` to `application/json`.
pub async fn json_content_type(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("application/json"));
    response
}
