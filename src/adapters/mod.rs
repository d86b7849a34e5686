//! Adapters Layer
//!
//! `inbound` serves HTTP (health gates, diagnostics, graceful shutdown);
//! `outbound` talks to the network and records client metrics.

pub mod inbound;
pub mod outbound;
