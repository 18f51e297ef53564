//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges. All problems are
//! collected so an operator sees every mistake in one pass.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.shutdown_timeout_secs must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("server.bind_host must not be empty")]
    EmptyBindHost,

    #[error("observability.metrics_path must be a fixed path starting with '/': {0:?}")]
    MetricsPath(String),

    #[error("observability.log_level is not a valid filter: {0:?}")]
    LogLevel(String),
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.server.bind_host.trim().is_empty() {
        errors.push(ValidationError::EmptyBindHost);
    }

    let path = &config.observability.metrics_path;
    if !is_fixed_route(path) {
        errors.push(ValidationError::MetricsPath(path.clone()));
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A route the router accepts without captures or wildcards.
fn is_fixed_route(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(|c: char| c.is_whitespace() || c == '{' || c == '}')
        && !path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
}
