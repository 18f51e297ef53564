//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Hold the collector registry (process, runtime, custom collectors)
//! - Record per-request metrics through the `metrics` facade
//! - Render one Prometheus text exposition body for `/metrics`
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `process_*` (Linux): CPU, memory, file descriptors, start time
//! - `tokio_runtime_*`: worker count, alive tasks, global queue depth
//!
//! # Design Decisions
//! - The facade recorder is process-wide and installed once; every
//!   registry renders it alongside its own collectors
//! - Collector registries are per-instance so tests can build many apps

use std::sync::OnceLock;
use std::time::Instant;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use prometheus::{core::Collector, Encoder, Registry, TextEncoder};
use thiserror::Error;

use crate::config::ObservabilityConfig;
use crate::observability::runtime::RuntimeCollector;

/// Counter of served requests.
pub const REQUESTS_TOTAL: &str = "http_requests_total";

/// Histogram of request latency in seconds.
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

/// Latency buckets tuned for typical web handlers.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Error type for metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("collector registration failed: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition output is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("no tokio runtime available for the runtime collector")]
    NoRuntime,
}

/// Registry of collectors exposed over HTTP.
///
/// Cheap to clone; clones share the same collectors.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    recorder: PrometheusHandle,
}

impl MetricsRegistry {
    /// Create an empty registry. The request-metrics recorder is attached.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            recorder: install_recorder(),
        }
    }

    /// Create a registry with the standard collectors enabled in `config`.
    pub fn from_config(config: &ObservabilityConfig) -> Result<Self, MetricsError> {
        let metrics = Self::new();

        if config.process_metrics {
            metrics.register_process_collector()?;
        }

        if config.runtime_metrics {
            match RuntimeCollector::for_current() {
                Ok(collector) => metrics.register(Box::new(collector))?,
                Err(MetricsError::NoRuntime) => {
                    tracing::warn!("No tokio runtime, runtime metrics disabled");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(metrics)
    }

    /// Register an additional collector.
    pub fn register(&self, collector: Box<dyn Collector>) -> Result<(), MetricsError> {
        self.registry.register(collector)?;
        Ok(())
    }

    /// The underlying collector registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every collector in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        let mut body = String::from_utf8(buffer)?;

        self.recorder.run_upkeep();
        let recorded = self.recorder.render();
        if !recorded.is_empty() {
            if !body.is_empty() && !body.ends_with('\n') {
                body.push('\n');
            }
            body.push_str(&recorded);
        }

        Ok(body)
    }

    #[cfg(target_os = "linux")]
    fn register_process_collector(&self) -> Result<(), MetricsError> {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        self.register(Box::new(collector))
    }

    #[cfg(not(target_os = "linux"))]
    fn register_process_collector(&self) -> Result<(), MetricsError> {
        tracing::debug!("Process collector unsupported on this platform");
        Ok(())
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}

/// Install the process-wide facade recorder once and return its handle.
fn install_recorder() -> PrometheusHandle {
    RECORDER
        .get_or_init(|| {
            let builder = PrometheusBuilder::new()
                .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Invalid latency buckets, using summaries");
                    PrometheusBuilder::new()
                });

            let recorder = builder.build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A global metrics recorder is already installed; request metrics are not exported");
            }
            handle
        })
        .clone()
}

/// Record one served request.
pub fn record_request(method: &str, status: u16, start_time: Instant) {
    let method = method.to_string();
    let status = status.to_string();

    metrics::counter!(REQUESTS_TOTAL, "method" => method.clone(), "status" => status.clone())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method, "status" => status)
        .record(start_time.elapsed().as_secs_f64());
}
