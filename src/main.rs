//! app-bootstrap service entry point.
//!
//! # Lifecycle Overview
//!
//! ```text
//!   config file ──▶ CLI overrides ──▶ logger ──▶ metrics registry ──▶ router
//!                                                                       │
//!                      ┌────────────────────────────────────────────────┘
//!                      ▼
//!   ┌────────┐   ┌──────────┐   ┌─────────┐  SIGINT   ┌──────────────┐
//!   │  Idle  │──▶│ Starting │──▶│ Running │──SIGTERM─▶│ ShuttingDown │
//!   └────────┘   └────┬─────┘   └─────────┘           └──────┬───────┘
//!                     │ bind error                    within │ deadline?
//!                     ▼                                 yes  │   no
//!                 ┌────────┐                       ┌─────────┴──┐ ┌───────────────┐
//!                 │ Failed │                       │  Stopped   │ │ ForcedStopped │
//!                 └────────┘                       └────────────┘ └───────────────┘
//! ```
//!
//! Exits non-zero when shutdown had to be forced.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use app_bootstrap::config::{read_config, AppConfig, ConfigError, LogFormat};
use app_bootstrap::App;

#[derive(Parser)]
#[command(name = "app-bootstrap")]
#[command(about = "HTTP service with /metrics and graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "APP_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (0 for an ephemeral port).
    #[arg(short, long, env = "APP_PORT")]
    port: Option<u16>,

    /// Graceful shutdown deadline in seconds.
    #[arg(long)]
    shutdown_timeout: Option<u64>,

    /// Log line format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn resolve_config(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => AppConfig::default(),
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.server.shutdown_timeout_secs = secs;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let port = config.server.port;

    let (app, log_guard) = App::init(config)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port,
        shutdown_timeout_secs = app.config().server.shutdown_timeout_secs,
        "Configuration loaded"
    );

    let code = match app.run_with_graceful_shutdown(port).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Shutdown failed");
            ExitCode::FAILURE
        }
    };

    log_guard.flush();
    Ok(code)
}
