//! Domain Layer
//!
//! Outbound request model, retry policy and the ports that the
//! application layer depends on. Nothing here performs I/O.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{Attempt, AttemptFailure, OutboundRequest, Response};
pub use errors::TransportError;
pub use value_objects::{ListenerLifecycle, RetryConfig};
