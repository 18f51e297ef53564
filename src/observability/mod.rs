//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (request counters and histograms)
//!     → runtime.rs (tokio scheduler gauges, sampled on scrape)
//!
//! Consumers:
//!     → stdout (JSON or pretty lines)
//!     → GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every request span
//! - Process and runtime collectors are sampled lazily at scrape time

pub mod logging;
pub mod metrics;
pub mod runtime;

pub use self::logging::{init_logging, LogGuard, LoggingError};
pub use self::metrics::{MetricsError, MetricsRegistry};
pub use self::runtime::RuntimeCollector;
