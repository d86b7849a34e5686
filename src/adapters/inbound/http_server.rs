//! HTTP Server
//!
//! Runs an axum router until a termination signal arrives, then drains
//! in-flight requests within a deadline.

use crate::domain::value_objects::ListenerLifecycle;
use crate::infrastructure::shutdown::TerminationListener;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned by [`ShutdownCoordinator`].
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("listener exited before shutdown was requested")]
    ListenerExited,

    #[error("listener task panicked")]
    ListenerPanicked,

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

enum Wake {
    Listener(Result<Result<(), ServerError>, JoinError>),
    Trigger,
}

/// Owns the listener lifecycle.
///
/// The listener runs in its own task; the coordinator waits for whichever
/// comes first, the trigger or the listener ending. Shutdown is requested
/// through a oneshot channel so it can only happen once per run.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_timeout: Duration,
    lifecycle: Arc<watch::Sender<ListenerLifecycle>>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (lifecycle, _) = watch::channel(ListenerLifecycle::Starting);
        Self {
            shutdown_timeout,
            lifecycle: Arc::new(lifecycle),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> ListenerLifecycle {
        *self.lifecycle.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ListenerLifecycle> {
        self.lifecycle.subscribe()
    }

    /// Bound address, once the listener is running.
    ///
    /// Returns `None` if the run ends without ever reaching `Running`.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|s| matches!(s, ListenerLifecycle::Running { .. }) || s.is_terminal())
            .await
            .ok()?;
        match *state {
            ListenerLifecycle::Running { local_addr } => Some(local_addr),
            _ => None,
        }
    }

    fn transition(&self, next: ListenerLifecycle) {
        tracing::debug!("listener lifecycle: {}", next);
        self.lifecycle.send_replace(next);
    }

    /// Serve `router` on `addr` until SIGINT or SIGTERM.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self, addr: &str, router: Router) -> Result<(), ServerError> {
        let signals = TerminationListener::install();
        self.run_until(addr, router, async move {
            signals.recv().await;
        })
        .await
    }

    /// Serve `router` on `addr` until `trigger` resolves.
    ///
    /// Returns `Ok(())` when the listener drained cleanly after the
    /// trigger. A listener that stops on its own first (bind failure,
    /// panic) is returned as an error without waiting for the trigger.
    /// Connections still open when the deadline passes are dropped.
    pub async fn run_until<F>(&self, addr: &str, router: Router, trigger: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        self.transition(ListenerLifecycle::Starting);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let lifecycle = self.lifecycle.clone();
        let addr = addr.to_string();

        let mut listener_task = tokio::spawn(async move {
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|source| ServerError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
            let local_addr = listener.local_addr().map_err(ServerError::Serve)?;
            tracing::info!("http server listening on {}", local_addr);
            lifecycle.send_replace(ListenerLifecycle::Running { local_addr });

            serve_connections(listener, router, stop_rx).await;
            Ok(())
        });

        tokio::pin!(trigger);
        let wake = tokio::select! {
            joined = &mut listener_task => Wake::Listener(joined),
            _ = &mut trigger => Wake::Trigger,
        };

        match wake {
            Wake::Listener(joined) => {
                let err = match flatten(joined) {
                    Ok(()) => ServerError::ListenerExited,
                    Err(e) => e,
                };
                tracing::error!("http server exited with error: {}", err);
                self.transition(ListenerLifecycle::Failed);
                Err(err)
            }
            Wake::Trigger => {
                self.transition(ListenerLifecycle::ShuttingDown);
                tracing::info!("graceful shutdown initiated...");
                let _ = stop_tx.send(());

                match tokio::time::timeout(self.shutdown_timeout, &mut listener_task).await {
                    Ok(joined) => match flatten(joined) {
                        Ok(()) => {
                            tracing::info!("graceful shutdown complete");
                            self.transition(ListenerLifecycle::Stopped);
                            Ok(())
                        }
                        Err(e) => {
                            tracing::error!("graceful shutdown errored: {}", e);
                            self.transition(ListenerLifecycle::Failed);
                            Err(e)
                        }
                    },
                    Err(_) => {
                        tracing::warn!(
                            "graceful shutdown timed out after {:?}, closing listener",
                            self.shutdown_timeout
                        );
                        // The listener task owns every connection task; once it
                        // is gone no connection survives.
                        listener_task.abort();
                        let _ = listener_task.await;
                        self.transition(ListenerLifecycle::Failed);
                        Err(ServerError::ShutdownTimeout(self.shutdown_timeout))
                    }
                }
            }
        }
    }
}

/// Accept loop. Every connection runs in a task held by `connections`, so
/// dropping this future aborts them all.
async fn serve_connections(listener: TcpListener, router: Router, mut stop: oneshot::Receiver<()>) {
    let drain = CancellationToken::new();
    let mut connections = JoinSet::new();

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    handle_accept_error(e).await;
                    continue;
                }
            },
            _ = &mut stop => break,
        };

        connections.spawn(serve_connection(stream, peer, router.clone(), drain.clone()));
        while connections.try_join_next().is_some() {}
    }

    drop(listener);
    drain.cancel();
    tracing::debug!("draining {} open connections", connections.len());
    while connections.join_next().await.is_some() {}
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Router, drain: CancellationToken) {
    let builder = Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let mut draining = false;
    let outcome = loop {
        tokio::select! {
            outcome = conn.as_mut() => break outcome,
            _ = drain.cancelled(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    };
    if let Err(e) = outcome {
        tracing::debug!("connection from {} closed: {}", peer, e);
    }
}

async fn handle_accept_error(e: std::io::Error) {
    if matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset
    ) {
        return;
    }
    // Typically fd exhaustion; back off instead of spinning
    tracing::error!("accept error: {}", e);
    tokio::time::sleep(Duration::from_secs(1)).await;
}

fn flatten(joined: Result<Result<(), ServerError>, JoinError>) -> Result<(), ServerError> {
    match joined {
        Ok(result) => result,
        Err(_) => Err(ServerError::ListenerPanicked),
    }
}

/// Serve `router` on `addr` with the default shutdown deadline.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn listen_and_serve(addr: &str, router: Router) -> Result<(), ServerError> {
    ShutdownCoordinator::default().run(addr, router).await
}
