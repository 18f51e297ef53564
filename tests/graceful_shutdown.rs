//! Graceful shutdown behavior of a bootstrapped app.

use std::time::{Duration, Instant};

use app_bootstrap::lifecycle::{LifecycleError, ServerState};
use app_bootstrap::App;

mod common;

#[tokio::test]
async fn test_clean_shutdown_with_no_requests() {
    let running = common::start_app(App::new(common::test_config()).unwrap()).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    let begun = Instant::now();
    running.shutdown.trigger();

    let result = running.handle.await.unwrap();
    assert!(result.is_ok());
    assert!(begun.elapsed() < Duration::from_secs(1));
    assert_eq!(running.observer.state(), ServerState::Stopped);
}

#[tokio::test]
async fn test_in_flight_request_completes_before_stop() {
    let (app, started) = common::slow_app(common::test_config(), Duration::from_millis(300));
    let running = common::start_app(app).await;

    let url = running.url("/slow");
    let request = tokio::spawn(async move { common::client().get(url).send().await });
    started.notified().await;

    running.shutdown.trigger();
    let result = running.handle.await.unwrap();
    assert!(result.is_ok(), "expected graceful stop, got {result:?}");

    let response = request.await.unwrap().expect("in-flight request was dropped");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "done");
}

#[tokio::test]
async fn test_blocked_handler_forces_shutdown_at_deadline() {
    let config = common::test_config();
    let deadline = config.server.shutdown_timeout();
    assert_eq!(deadline, Duration::from_secs(5));

    let (app, started) = common::slow_app(config, Duration::from_secs(10));
    let running = common::start_app(app).await;

    let url = running.url("/slow");
    let _request = tokio::spawn(async move { common::client().get(url).send().await });
    started.notified().await;

    let begun = Instant::now();
    running.shutdown.trigger();
    let result = running.handle.await.unwrap();
    let elapsed = begun.elapsed();

    match result {
        Err(LifecycleError::ForcedShutdown { timeout }) => assert_eq!(timeout, deadline),
        other => panic!("expected forced shutdown, got {other:?}"),
    }
    assert!(elapsed >= deadline, "returned early after {elapsed:?}");
    assert!(elapsed < deadline + Duration::from_secs(1), "returned late after {elapsed:?}");
    assert_eq!(running.observer.state(), ServerState::ForcedStopped);
}

#[tokio::test]
async fn test_keeps_serving_without_signal() {
    let running = common::start_app(App::new(common::test_config()).unwrap()).await;

    let waited = tokio::time::timeout(Duration::from_millis(200), async {
        let mut observer = running.observer.clone();
        observer.wait_for(|s| s.is_terminal()).await
    })
    .await;
    assert!(waited.is_err(), "server stopped without a signal");
    assert!(!running.handle.is_finished());

    let response = common::client().get(running.url("/metrics")).send().await.unwrap();
    assert!(response.status().is_success());

    running.handle.abort();
}

#[tokio::test]
async fn test_refuses_connections_after_stop() {
    let running = common::start_app(App::new(common::test_config()).unwrap()).await;
    let url = running.url("/metrics");

    running.shutdown.trigger();
    running.handle.await.unwrap().unwrap();

    assert!(common::client().get(url).send().await.is_err());
}
