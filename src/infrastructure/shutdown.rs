//! Termination Signals
//!
//! Waits for the process-level stop requests a container orchestrator
//! sends: interrupt (Ctrl+C) and SIGTERM.

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Which termination request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

/// Signal handlers installed ahead of time.
///
/// Installing eagerly means a signal delivered between startup and the
/// first `recv` is not lost. A handler that fails to install is logged
/// and that source never fires.
pub struct TerminationListener {
    #[cfg(unix)]
    interrupt: Option<Signal>,
    #[cfg(unix)]
    terminate: Option<Signal>,
}

impl TerminationListener {
    #[cfg(unix)]
    pub fn install() -> Self {
        Self {
            interrupt: install_handler(SignalKind::interrupt(), "SIGINT"),
            terminate: install_handler(SignalKind::terminate(), "SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    pub fn install() -> Self {
        Self {}
    }

    /// Wait for the first termination signal.
    #[cfg(unix)]
    pub async fn recv(self) -> TerminationSignal {
        let Self {
            interrupt,
            terminate,
        } = self;

        let received = tokio::select! {
            _ = wait_on(interrupt) => TerminationSignal::Interrupt,
            _ = wait_on(terminate) => TerminationSignal::Terminate,
        };
        log_received(received);
        received
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> TerminationSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        log_received(TerminationSignal::Interrupt);
        TerminationSignal::Interrupt
    }
}

#[cfg(unix)]
fn install_handler(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(handler) => Some(handler),
        Err(e) => {
            tracing::error!("failed to install {} handler: {}", name, e);
            None
        }
    }
}

#[cfg(unix)]
async fn wait_on(handler: Option<Signal>) {
    match handler {
        Some(mut handler) => {
            if handler.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

fn log_received(signal: TerminationSignal) {
    match signal {
        TerminationSignal::Interrupt => tracing::info!("interrupt received"),
        TerminationSignal::Terminate => tracing::info!("SIGTERM received (Kubernetes shutdown?)"),
    }
}

/// Resolve on the next SIGINT or SIGTERM.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn termination_signal() -> TerminationSignal {
    TerminationListener::install().recv().await
}
