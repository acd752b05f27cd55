//! Observability infrastructure for the kubelet monitor
//!
//! Provides:
//! - Prometheus metrics (cycle latency, per-node outcomes, sink size)
//! - Structured logging of discovery-cycle events with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Histogram buckets for cycle latency (in seconds)
const CYCLE_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    cycle_latency_seconds: HistogramVec,
    nodes_scraped: IntCounterVec,
    node_scrape_failures: IntCounterVec,
    nodes_skipped_cached: IntCounterVec,
    nodes_cancelled: IntCounterVec,
    sink_entries: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram_vec!(
                "kubelet_monitor_cycle_latency_seconds",
                "Time spent running one discovery cycle across all nodes",
                &["mode"],
                CYCLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            nodes_scraped: register_int_counter_vec!(
                "kubelet_monitor_nodes_scraped_total",
                "Nodes whose statistics were turned into metrics",
                &["mode"]
            )
            .expect("Failed to register nodes_scraped"),

            node_scrape_failures: register_int_counter_vec!(
                "kubelet_monitor_node_scrape_failures_total",
                "Nodes abandoned because a stats request failed",
                &["mode", "resource"]
            )
            .expect("Failed to register node_scrape_failures"),

            nodes_skipped_cached: register_int_counter_vec!(
                "kubelet_monitor_nodes_skipped_cached_total",
                "Nodes skipped in sampling cycles because the agent answered from cache",
                &["mode"]
            )
            .expect("Failed to register nodes_skipped_cached"),

            nodes_cancelled: register_int_counter_vec!(
                "kubelet_monitor_nodes_cancelled_total",
                "Scrape tasks that observed the stop signal before starting",
                &["mode"]
            )
            .expect("Failed to register nodes_cancelled"),

            sink_entries: register_int_gauge!(
                "kubelet_monitor_sink_entries",
                "Number of metric entries produced by the last cycle"
            )
            .expect("Failed to register sink_entries"),
        }
    }
}

/// Discovery mode label value
pub fn mode_label(full_discovery: bool) -> &'static str {
    if full_discovery {
        "full"
    } else {
        "sampling"
    }
}

/// Monitor metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance. Clones share the
/// same collectors.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a metrics handle (registers collectors on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_cycle_latency(&self, mode: &str, duration_secs: f64) {
        self.inner()
            .cycle_latency_seconds
            .with_label_values(&[mode])
            .observe(duration_secs);
    }

    pub fn inc_nodes_scraped(&self, mode: &str) {
        self.inner().nodes_scraped.with_label_values(&[mode]).inc();
    }

    pub fn inc_node_scrape_failures(&self, mode: &str, resource: &str) {
        self.inner()
            .node_scrape_failures
            .with_label_values(&[mode, resource])
            .inc();
    }

    pub fn inc_nodes_skipped_cached(&self, mode: &str) {
        self.inner()
            .nodes_skipped_cached
            .with_label_values(&[mode])
            .inc();
    }

    pub fn inc_nodes_cancelled(&self, mode: &str) {
        self.inner().nodes_cancelled.with_label_values(&[mode]).inc();
    }

    pub fn set_sink_entries(&self, count: i64) {
        self.inner().sink_entries.set(count);
    }
}

/// Structured logger for discovery-cycle events
#[derive(Clone)]
pub struct StructuredLogger {
    source: &'static str,
}

impl StructuredLogger {
    pub fn new(source: &'static str) -> Self {
        Self { source }
    }

    pub fn log_cycle_started(&self, node_count: usize, full_discovery: bool) {
        info!(
            event = "discovery_cycle_started",
            source = %self.source,
            nodes = node_count,
            mode = mode_label(full_discovery),
            "Monitor has started task"
        );
    }

    pub fn log_cycle_completed(
        &self,
        full_discovery: bool,
        scraped: usize,
        failed: usize,
        skipped: usize,
        entries: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "discovery_cycle_completed",
            source = %self.source,
            mode = mode_label(full_discovery),
            scraped = scraped,
            failed = failed,
            skipped = skipped,
            entries = entries,
            elapsed_ms = elapsed_ms,
            "Monitor has finished task"
        );
    }

    pub fn log_node_failed(&self, node: &str, resource: &str, error: &dyn std::error::Error) {
        error!(
            event = "node_scrape_failed",
            source = %self.source,
            node = %node,
            resource = %resource,
            error = %error,
            "Failed to get resource metrics"
        );
    }

    pub fn log_cache_used(&self, node: &str) {
        warn!(
            event = "node_cache_used",
            source = %self.source,
            node = %node,
            "Node agent answered from cache, recording degraded metrics"
        );
    }

    pub fn log_sample_skipped(&self, node: &str) {
        warn!(
            event = "node_sample_skipped",
            source = %self.source,
            node = %node,
            "Failed to get resource metrics sample, waiting for the next full discovery"
        );
    }
}

/// Install the global tracing subscriber
///
/// Filtering follows `RUST_LOG`, defaulting to `info`.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if result.is_err() {
        warn!("Tracing subscriber already installed");
    }
}
