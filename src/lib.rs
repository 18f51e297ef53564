//! Application bootstrap for HTTP services.
//!
//! Builds a structured logger, an axum router with a Prometheus `/metrics`
//! endpoint, and runs it under a server that shuts down gracefully on
//! SIGINT/SIGTERM within a bounded deadline.

pub mod app;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use app::{App, AppError};
pub use config::AppConfig;
pub use lifecycle::{run_with_graceful_shutdown, GracefulServer, LifecycleError, Shutdown};
pub use observability::MetricsRegistry;
