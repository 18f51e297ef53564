//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use app_bootstrap::lifecycle::{LifecycleError, LifecycleObserver, Shutdown};
use app_bootstrap::{App, AppConfig};
use axum::routing::get;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// An app serving on an ephemeral local port.
#[allow(dead_code)]
pub struct RunningApp {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub observer: LifecycleObserver,
    pub handle: JoinHandle<Result<(), LifecycleError>>,
}

#[allow(dead_code)]
impl RunningApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config bound to loopback on an ephemeral port.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.bind_host = "127.0.0.1".to_string();
    config.server.port = 0;
    config
}

/// Start `app` with an in-process shutdown trigger and wait until it listens.
#[allow(dead_code)]
pub async fn start_app(app: App) -> RunningApp {
    let shutdown = Shutdown::new();
    let mut listener = shutdown.subscribe();

    let server = app.into_server(0);
    let mut observer = server.observer();
    let handle = tokio::spawn(server.run_until(async move { listener.recv().await }));

    let addr = observer.running().await.expect("server did not start");
    RunningApp {
        addr,
        shutdown,
        observer,
        handle,
    }
}

/// HTTP client without connection pooling, so idle connections never hold
/// up a graceful shutdown.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap()
}

/// A route that signals `started` and then sleeps for `delay`.
#[allow(dead_code)]
pub fn slow_app(config: AppConfig, delay: Duration) -> (App, Arc<Notify>) {
    let started = Arc::new(Notify::new());
    let notify = started.clone();

    let app = App::new(config).unwrap().route(
        "/slow",
        get(move || {
            let notify = notify.clone();
            async move {
                notify.notify_one();
                tokio::time::sleep(delay).await;
                "done"
            }
        }),
    );

    (app, started)
}
