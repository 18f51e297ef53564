//! Shutdown driven by real OS signals.
//!
//! Signals are process-wide, so every scenario lives in one test and runs
//! sequentially.

#![cfg(unix)]

use std::time::{Duration, Instant};

use app_bootstrap::lifecycle::{LifecycleError, ServerState};
use app_bootstrap::{run_with_graceful_shutdown, App};
use axum::routing::get;
use axum::Router;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

mod common;

async fn stop_with(signal: Signal) {
    let app = App::new(common::test_config()).unwrap();
    let server = app.into_server(0);
    let mut observer = server.observer();

    let handle = tokio::spawn(server.run());
    observer.running().await.expect("server did not start");

    tokio::time::sleep(Duration::from_millis(10)).await;
    let begun = Instant::now();
    kill(Pid::this(), signal).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not return after signal")
        .unwrap();

    assert!(result.is_ok(), "{signal:?}: {result:?}");
    assert!(begun.elapsed() < Duration::from_secs(1));
    assert_eq!(observer.state(), ServerState::Stopped);
}

/// Spawn `run`, give it time to install handlers, then send `signal`.
async fn signal_entry_point<F>(run: F, signal: Signal)
where
    F: std::future::Future<Output = Result<(), LifecycleError>> + Send + 'static,
{
    let handle = tokio::spawn(run);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let begun = Instant::now();
    kill(Pid::this(), signal).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run did not return after signal")
        .unwrap();

    assert!(result.is_ok(), "{signal:?}: {result:?}");
    assert!(begun.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_termination_signals_stop_cleanly() {
    stop_with(Signal::SIGTERM).await;
    stop_with(Signal::SIGINT).await;

    let router = Router::new().route("/ping", get(|| async { "pong" }));
    signal_entry_point(run_with_graceful_shutdown(0, router), Signal::SIGTERM).await;

    let app = App::new(common::test_config()).unwrap();
    signal_entry_point(app.run_with_graceful_shutdown(0), Signal::SIGINT).await;
}
