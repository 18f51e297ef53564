//! Application bootstrap.
//!
//! # Responsibilities
//! - Build the metrics registry with the standard collectors
//! - Build the router with the metrics endpoint registered
//! - Install the logger
//! - Run the router under a [`GracefulServer`]
//!
//! # Design Decisions
//! - Routes are collected first and middleware applied at run time
//! - Logging is process-global and kept out of [`App::new`] so tests can
//!   build many apps

use std::future::Future;

use axum::{routing::MethodRouter, Router};
use thiserror::Error;

use crate::config::{validate_config, AppConfig, ConfigError, ServerConfig};
use crate::http::{metrics_router, with_middleware};
use crate::lifecycle::{GracefulServer, LifecycleError, TerminationSignal};
use crate::observability::{init_logging, LogGuard, LoggingError, MetricsError, MetricsRegistry};

/// Error type for application setup.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// A logger-, metrics- and router-equipped HTTP application.
pub struct App {
    config: AppConfig,
    router: Router,
    metrics: MetricsRegistry,
}

impl App {
    /// Build the app: metrics registry with collectors and `GET /metrics`.
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let metrics = MetricsRegistry::from_config(&config.observability)?;
        let router = metrics_router(&config.observability.metrics_path, metrics.clone());

        tracing::debug!(
            metrics_path = %config.observability.metrics_path,
            "Application initialized"
        );

        Ok(Self {
            config,
            router,
            metrics,
        })
    }

    /// Build the app, then install the global logger.
    ///
    /// Keep the returned guard alive until exit; dropping it flushes logs.
    pub fn init(config: AppConfig) -> Result<(Self, LogGuard), AppError> {
        let app = Self::new(config)?;
        let guard = init_logging(&app.config.observability)?;
        Ok((app, guard))
    }

    /// Register a handler for a fixed path.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Merge another router's routes.
    pub fn merge(mut self, router: Router) -> Self {
        self.router = self.router.merge(router);
        self
    }

    /// The metrics registry, for registering custom collectors.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The complete router with middleware applied.
    pub fn router(&self) -> Router {
        with_middleware(self.router.clone(), self.config.server.request_timeout())
    }

    /// A server for this app on `port`, using the remaining server settings.
    pub fn into_server(self, port: u16) -> GracefulServer {
        let router = self.router();
        let config = ServerConfig {
            port,
            ..self.config.server
        };
        GracefulServer::new(router, config)
    }

    /// Serve on `port` until SIGINT or SIGTERM, then shut down gracefully.
    pub async fn run_with_graceful_shutdown(self, port: u16) -> Result<(), LifecycleError> {
        self.into_server(port).run().await
    }

    /// Serve on `port` until `trigger` resolves, then shut down gracefully.
    pub async fn run_until<F>(self, port: u16, trigger: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = TerminationSignal> + Send,
    {
        self.into_server(port).run_until(trigger).await
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
