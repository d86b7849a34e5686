//! Infrastructure Layer
//!
//! Process wiring: OS termination signals and client construction.

pub mod client_factory;
pub mod shutdown;

pub use client_factory::extended_http_client;
pub use shutdown::{termination_signal, TerminationListener, TerminationSignal};
