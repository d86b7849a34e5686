//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use std::net::SocketAddr;

/// Retry budget for a transport.
///
/// `max_retries` counts additional attempts after the first one, so a
/// budget of 0 means exactly one attempt and N means up to N+1 attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryConfig {
    max_retries: u32,
}

impl RetryConfig {
    /// Build from a signed budget. Negative values behave like 0.
    ///
    /// # Examples
    /// ```
    /// use svc_http::domain::RetryConfig;
    ///
    /// assert_eq!(RetryConfig::new(-3), RetryConfig::new(0));
    /// assert_eq!(RetryConfig::new(2).total_attempts(), 3);
    /// ```
    pub fn new(max_retries: i32) -> Self {
        Self {
            max_retries: max_retries.max(0) as u32,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on attempts made for one call.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// State of one listener run.
///
/// `Starting -> Running -> ShuttingDown -> Stopped`, or `-> Failed` from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerLifecycle {
    Starting,
    Running { local_addr: SocketAddr },
    ShuttingDown,
    Stopped,
    Failed,
}

impl ListenerLifecycle {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl std::fmt::Display for ListenerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Running { local_addr } => write!(f, "running on {}", local_addr),
            Self::ShuttingDown => write!(f, "shutting-down"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
