//! Transport Port
//!
//! The request-executor seam. Every layer of the outbound stack (network
//! client, retry loop, instrumentation) implements this trait and wraps
//! another implementation of it.

use crate::domain::entities::{OutboundRequest, Response};
use crate::domain::errors::TransportError;
use async_trait::async_trait;
use std::sync::Arc;

/// Executes one logical outbound request.
///
/// Implementations must be safe for concurrent use; a single instance is
/// shared by every caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &OutboundRequest) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &OutboundRequest) -> Result<Response, TransportError> {
        (**self).execute(request).await
    }
}
