//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Pick JSON or pretty output from config
//! - Hand back a guard that flushes buffered lines before exit
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Lines are written through a non-blocking stdout writer; the
//!   returned [`LogGuard`] must be held until the process exits

use std::fmt;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, ObservabilityConfig};

/// Error type for logger setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("a global logger is already installed")]
    AlreadyInitialized,
}

/// Keeps the background log writer alive.
///
/// Dropping the guard flushes every buffered line.
pub struct LogGuard {
    inner: Option<WorkerGuard>,
}

impl LogGuard {
    /// Flush pending log lines and stop the writer thread.
    pub fn flush(mut self) {
        drop(self.inner.take());
    }
}

impl fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogGuard")
            .field("active", &self.inner.is_some())
            .finish()
    }
}

/// Build the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|source| LoggingError::Filter {
        filter: config.log_level.clone(),
        source,
    })
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<LogGuard, LoggingError> {
    let filter = build_filter(config)?;
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let layer = match config.log_format {
        LogFormat::Json => fmt_layer::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_writer(writer)
            .json()
            .boxed(),
        LogFormat::Pretty => fmt_layer::layer()
            .with_target(true)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    tracing::info!(
        level = %config.log_level,
        format = ?config.log_format,
        "Logger initialized"
    );

    Ok(LogGuard { inner: Some(guard) })
}
