//! Tokio runtime collector.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntGauge, Opts};
use tokio::runtime::Handle;

use crate::observability::metrics::MetricsError;

/// Samples the runtime's scheduler counters on every scrape.
pub struct RuntimeCollector {
    handle: Handle,
    workers: IntGauge,
    alive_tasks: IntGauge,
    global_queue_depth: IntGauge,
}

impl RuntimeCollector {
    /// Build a collector for the given runtime.
    pub fn new(handle: Handle) -> Result<Self, MetricsError> {
        Ok(Self {
            handle,
            workers: IntGauge::with_opts(Opts::new(
                "tokio_runtime_workers",
                "Number of worker threads used by the runtime.",
            ))?,
            alive_tasks: IntGauge::with_opts(Opts::new(
                "tokio_runtime_alive_tasks",
                "Number of tasks currently alive in the runtime.",
            ))?,
            global_queue_depth: IntGauge::with_opts(Opts::new(
                "tokio_runtime_global_queue_depth",
                "Number of tasks waiting in the runtime's global queue.",
            ))?,
        })
    }

    /// Build a collector for the runtime the caller is running on.
    pub fn for_current() -> Result<Self, MetricsError> {
        let handle = Handle::try_current().map_err(|_| MetricsError::NoRuntime)?;
        Self::new(handle)
    }

    fn gauges(&self) -> [&IntGauge; 3] {
        [&self.workers, &self.alive_tasks, &self.global_queue_depth]
    }
}

impl Collector for RuntimeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauges().into_iter().flat_map(|g| g.desc()).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let metrics = self.handle.metrics();
        self.workers.set(metrics.num_workers() as i64);
        self.alive_tasks.set(metrics.num_alive_tasks() as i64);
        self.global_queue_depth.set(metrics.global_queue_depth() as i64);

        self.gauges().into_iter().flat_map(|g| g.collect()).collect()
    }
}
