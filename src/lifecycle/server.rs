//! Graceful server lifecycle.
//!
//! # Responsibilities
//! - Bind and serve the router on a spawned task so the caller is not blocked
//! - Block the caller until a termination signal (or injected trigger)
//! - Stop the server and wait for in-flight requests, bounded by a deadline
//! - Report a forced shutdown distinctly from a clean one
//!
//! # Design Decisions
//! - Start failures are logged and detached unless
//!   `exit_on_start_failure` is set
//! - No readiness handshake: a shutdown requested before the listener is
//!   bound closes it without error
//! - On deadline expiry the serve task is aborted and the caller gets
//!   [`LifecycleError::ForcedShutdown`]

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};

use crate::config::ServerConfig;
use crate::lifecycle::signals::{TerminationSignal, TerminationSignals};
use crate::lifecycle::state::{ServerState, StateCell};

/// Error type for a server run.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// In-flight requests did not finish before the deadline.
    #[error("server forced to shutdown: in-flight requests still running after {timeout:?}")]
    ForcedShutdown { timeout: Duration },

    /// The listener could not start (only with `exit_on_start_failure`).
    #[error("server failed to start: {0}")]
    Start(#[source] io::Error),

    /// Signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),
}

/// An HTTP server that shuts down gracefully within a deadline.
pub struct GracefulServer {
    router: Router,
    config: ServerConfig,
    shutdown_timeout: Duration,
    state: StateCell,
    local_addr: Arc<watch::Sender<Option<SocketAddr>>>,
}

impl GracefulServer {
    /// Create a server for `router` using the given configuration.
    pub fn new(router: Router, config: ServerConfig) -> Self {
        let (local_addr, _) = watch::channel(None);
        Self {
            router,
            shutdown_timeout: config.shutdown_timeout(),
            config,
            state: StateCell::new(),
            local_addr: Arc::new(local_addr),
        }
    }

    /// Override the shutdown deadline with sub-second precision.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Watch the server's state and bound address.
    pub fn observer(&self) -> LifecycleObserver {
        LifecycleObserver {
            state: self.state.subscribe(),
            local_addr: self.local_addr.subscribe(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// Serve until SIGINT or SIGTERM, then shut down gracefully.
    pub async fn run(self) -> Result<(), LifecycleError> {
        let mut signals = TerminationSignals::install().map_err(LifecycleError::Signal)?;
        self.run_until(async move { signals.recv().await }).await
    }

    /// Serve until `trigger` resolves, then shut down gracefully.
    pub async fn run_until<F>(self, trigger: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = TerminationSignal> + Send,
    {
        let port = self.config.port;
        let address = format!("{}:{}", self.config.bind_host, port);

        self.state.advance(ServerState::Starting);
        tracing::info!(port, address = %address, "Starting server");

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (failed_tx, failed_rx) = oneshot::channel::<io::Error>();

        let mut server_task = tokio::spawn(serve(
            address,
            self.router,
            self.state.clone(),
            self.local_addr.clone(),
            stop_rx,
            failed_tx,
        ));

        let signal = if self.config.exit_on_start_failure {
            tokio::select! {
                signal = trigger => signal,
                Ok(error) = failed_rx => return Err(LifecycleError::Start(error)),
            }
        } else {
            drop(failed_rx);
            trigger.await
        };

        if !self.state.advance(ServerState::ShuttingDown) {
            // The accept loop already failed and logged why; nothing is listening.
            tracing::info!(signal = %signal, state = %self.state.get(), "Shutdown requested, server not running");
            return Ok(());
        }
        tracing::info!(signal = %signal, "Shutting down server...");

        let _ = stop_tx.send(());

        match tokio::time::timeout(self.shutdown_timeout, &mut server_task).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Server task ended abnormally");
                }
                self.state.advance(ServerState::Stopped);
                tracing::info!("Server exited gracefully");
                Ok(())
            }
            Err(_) => {
                server_task.abort();
                self.state.advance(ServerState::ForcedStopped);
                let err = LifecycleError::ForcedShutdown {
                    timeout: self.shutdown_timeout,
                };
                tracing::error!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    error = %err,
                    "Server forced to shutdown"
                );
                Err(err)
            }
        }
    }
}

/// Accept loop: bind, publish the address, serve until told to stop.
async fn serve(
    address: String,
    router: Router,
    state: StateCell,
    local_addr: Arc<watch::Sender<Option<SocketAddr>>>,
    stop: oneshot::Receiver<()>,
    failed: oneshot::Sender<io::Error>,
) {
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %address, error = %e, "Server failed");
            state.advance(ServerState::Failed);
            let _ = failed.send(e);
            return;
        }
    };

    if let Ok(bound) = listener.local_addr() {
        local_addr.send_replace(Some(bound));
        tracing::info!(address = %bound, "Listening for connections");
    }
    state.advance(ServerState::Running);

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            // A dropped sender means the caller went away; stop as well.
            let _ = stop.await;
        })
        .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "Server failed");
        state.advance(ServerState::Failed);
        let _ = failed.send(e);
    }
}

/// Serve `router` on `port` until SIGINT or SIGTERM, with default settings.
pub async fn run_with_graceful_shutdown(port: u16, router: Router) -> Result<(), LifecycleError> {
    let config = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    GracefulServer::new(router, config).run().await
}

/// Read-only view of a running [`GracefulServer`].
#[derive(Debug, Clone)]
pub struct LifecycleObserver {
    state: watch::Receiver<ServerState>,
    local_addr: watch::Receiver<Option<SocketAddr>>,
}

impl LifecycleObserver {
    /// Current state.
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Address the listener is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.borrow()
    }

    /// Wait until the state satisfies `predicate` and return it.
    ///
    /// Returns the last published state if the server is dropped first.
    pub async fn wait_for<P>(&mut self, mut predicate: P) -> ServerState
    where
        P: FnMut(ServerState) -> bool,
    {
        let reached = match self.state.wait_for(|s| predicate(*s)).await {
            Ok(state) => Some(*state),
            Err(_) => None,
        };
        reached.unwrap_or_else(|| self.state())
    }

    /// Wait until the listener is bound. `None` if startup failed or shutdown
    /// began first.
    pub async fn running(&mut self) -> Option<SocketAddr> {
        let state = self.wait_for(|s| s != ServerState::Idle && s != ServerState::Starting).await;
        if state == ServerState::Running {
            self.local_addr()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use axum::routing::get;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        }
    }

    async fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_clean_shutdown_without_requests() {
        let server = GracefulServer::new(Router::new(), test_config());
        let mut observer = server.observer();
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();

        let run = tokio::spawn(server.run_until(async move { listener.recv().await }));

        assert!(observer.running().await.is_some());
        shutdown.trigger();

        let result = run.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(observer.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_serves_requests_while_running() {
        let router = Router::new().route("/ping", get(|| async { "pong" }));
        let server = GracefulServer::new(router, test_config());
        let mut observer = server.observer();
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();

        let run = tokio::spawn(server.run_until(async move { listener.recv().await }));
        let addr = observer.running().await.unwrap();

        let response = raw_get(addr, "/ping").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("pong"));

        shutdown.trigger();
        assert!(run.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_slow_request_forces_shutdown() {
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let started_tx = Arc::new(std::sync::Mutex::new(Some(started_tx)));
        let router = Router::new().route(
            "/slow",
            get(move || {
                let started_tx = started_tx.clone();
                async move {
                    if let Some(tx) = started_tx.lock().unwrap().take() {
                        let _ = tx.send(());
                    }
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    "done"
                }
            }),
        );

        let timeout = Duration::from_millis(300);
        let server = GracefulServer::new(router, test_config()).with_shutdown_timeout(timeout);
        let mut observer = server.observer();
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();

        let run = tokio::spawn(server.run_until(async move { listener.recv().await }));
        let addr = observer.running().await.unwrap();

        let _client = tokio::spawn(async move { raw_get(addr, "/slow").await });
        started_rx.await.unwrap();

        let begun = Instant::now();
        shutdown.trigger();
        let result = run.await.unwrap();
        let elapsed = begun.elapsed();

        assert!(matches!(result, Err(LifecycleError::ForcedShutdown { timeout: t }) if t == timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(2));
        assert_eq!(observer.state(), ServerState::ForcedStopped);
    }

    #[tokio::test]
    async fn test_no_trigger_keeps_running() {
        let server = GracefulServer::new(Router::new(), test_config());
        let mut observer = server.observer();

        let run = tokio::spawn(server.run_until(std::future::pending::<TerminationSignal>()));
        observer.running().await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!run.is_finished());
        assert_eq!(observer.state(), ServerState::Running);
        run.abort();
    }

    #[tokio::test]
    async fn test_start_failure_is_detached_by_default() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            port: occupied.local_addr().unwrap().port(),
            ..test_config()
        };

        let server = GracefulServer::new(Router::new(), config);
        let mut observer = server.observer();
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();

        let run = tokio::spawn(server.run_until(async move { listener.recv().await }));

        assert_eq!(observer.running().await, None);
        assert_eq!(observer.state(), ServerState::Failed);
        assert!(!run.is_finished());

        shutdown.trigger();
        assert!(run.await.unwrap().is_ok());
        assert_eq!(observer.state(), ServerState::Failed);
    }

    #[tokio::test]
    async fn test_start_failure_can_be_surfaced() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ServerConfig {
            port: occupied.local_addr().unwrap().port(),
            exit_on_start_failure: true,
            ..test_config()
        };

        let server = GracefulServer::new(Router::new(), config);
        let result = server.run_until(std::future::pending::<TerminationSignal>()).await;
        assert!(matches!(result, Err(LifecycleError::Start(_))));
    }

    #[tokio::test]
    async fn test_shutdown_before_bind_is_clean() {
        let server = GracefulServer::new(Router::new(), test_config());
        let observer = server.observer();

        let result = server
            .run_until(async { TerminationSignal::Manual })
            .await;

        assert!(result.is_ok());
        assert_eq!(observer.state(), ServerState::Stopped);
    }
}
