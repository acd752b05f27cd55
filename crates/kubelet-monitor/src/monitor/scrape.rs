//! Discovery-cycle orchestration
//!
//! Fans out one scrape task per node, waits for all of them and hands
//! back the cycle's sink. A node that cannot be scraped is logged and
//! left out; it never fails the cycle or any other node.

use super::client::StatsClient;
use super::keys;
use super::parse::StatsParser;
use super::stats::Node;
use super::throttling::CONTAINER_CPU_THROTTLED_TOTAL;
use crate::config::{FeatureGates, MonitorConfig};
use crate::error::{MonitorError, Result};
use crate::metrics::MetricSink;
use crate::observability::{mode_label, MonitorMetrics, StructuredLogger};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Source name used in logs
pub const MONITOR_SOURCE: &str = "kubelet";

/// What became of one node during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Metrics were written for the node
    Scraped,
    /// Sampling cycle saw a cached answer and left the node out
    SkippedCached,
    /// The stop signal was raised before the task started
    Cancelled,
}

/// Per-cycle tally of node outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub scraped: usize,
    pub failed: usize,
    pub skipped_cached: usize,
    pub cancelled: usize,
}

/// Resource metrics monitor scraping node agents
pub struct KubeletMonitor {
    client: Arc<dyn StatsClient>,
    config: MonitorConfig,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
}

impl KubeletMonitor {
    pub fn new(client: Arc<dyn StatsClient>, config: MonitorConfig) -> Self {
        Self {
            client,
            config,
            metrics: MonitorMetrics::new(),
            logger: StructuredLogger::new(MONITOR_SOURCE),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Scrape every node and return the filled sink
    ///
    /// Raising `stop` turns tasks that have not started yet into no-ops;
    /// tasks already talking to a node agent run to completion.
    pub async fn run_cycle(
        &self,
        nodes: &[Node],
        full_discovery: bool,
        stop: CancellationToken,
    ) -> Result<MetricSink> {
        self.run_cycle_with_report(nodes, full_discovery, stop)
            .await
            .map(|(sink, _)| sink)
    }

    /// Same as [`run_cycle`](Self::run_cycle), also returning the per-node
    /// outcome tally
    pub async fn run_cycle_with_report(
        &self,
        nodes: &[Node],
        full_discovery: bool,
        stop: CancellationToken,
    ) -> Result<(MetricSink, CycleReport)> {
        if nodes.is_empty() {
            error!(source = MONITOR_SOURCE, "Failed to execute task: empty node list");
            return Err(MonitorError::EmptyNodeList);
        }

        let start = Instant::now();
        let mode = mode_label(full_discovery);
        self.logger.log_cycle_started(nodes.len(), full_discovery);

        let sink = MetricSink::new();
        let limiter = self
            .config
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        let mut tasks = JoinSet::new();

        for node in nodes {
            let scraper = NodeScraper {
                client: Arc::clone(&self.client),
                sink: sink.clone(),
                full_discovery,
                features: self.config.features,
                stop: stop.clone(),
                logger: self.logger.clone(),
            };
            let limiter = limiter.clone();
            let node = node.clone();

            tasks.spawn(async move {
                let result = scraper.run(&node, limiter).await;
                (node.name, result)
            });
        }

        let mut report = CycleReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(NodeOutcome::Scraped))) => {
                    report.scraped += 1;
                    self.metrics.inc_nodes_scraped(mode);
                }
                Ok((_, Ok(NodeOutcome::SkippedCached))) => {
                    report.skipped_cached += 1;
                    self.metrics.inc_nodes_skipped_cached(mode);
                }
                Ok((_, Ok(NodeOutcome::Cancelled))) => {
                    report.cancelled += 1;
                    self.metrics.inc_nodes_cancelled(mode);
                }
                Ok((node, Err(e))) => {
                    report.failed += 1;
                    let resource = failed_resource(&e);
                    self.metrics.inc_node_scrape_failures(mode, resource);
                    self.logger.log_node_failed(&node, resource, &e);
                }
                Err(e) => {
                    report.failed += 1;
                    self.metrics.inc_node_scrape_failures(mode, "task");
                    error!(error = %e, "Scrape task did not complete");
                }
            }
        }

        let elapsed = start.elapsed();
        self.metrics
            .observe_cycle_latency(mode, elapsed.as_secs_f64());
        self.metrics.set_sink_entries(sink.len() as i64);
        self.logger.log_cycle_completed(
            full_discovery,
            report.scraped,
            report.failed,
            report.skipped_cached + report.cancelled,
            sink.len(),
            elapsed.as_millis(),
        );

        Ok((sink, report))
    }
}

fn failed_resource(error: &MonitorError) -> &'static str {
    match error {
        MonitorError::Fetch { resource, .. } => *resource,
        MonitorError::NoMonitorAddress { .. } => "address",
        MonitorError::EmptyNodeList | MonitorError::Config(_) => "other",
    }
}

/// Everything one node's scrape task needs
struct NodeScraper {
    client: Arc<dyn StatsClient>,
    sink: MetricSink,
    full_discovery: bool,
    features: FeatureGates,
    stop: CancellationToken,
    logger: StructuredLogger,
}

impl NodeScraper {
    async fn run(&self, node: &Node, limiter: Option<Arc<Semaphore>>) -> Result<NodeOutcome> {
        let _permit = match limiter {
            Some(limiter) => tokio::select! {
                permit = limiter.acquire_owned() => permit.ok(),
                _ = self.stop.cancelled() => return Ok(NodeOutcome::Cancelled),
            },
            None => None,
        };

        if self.stop.is_cancelled() {
            debug!(node = %node.name, "Stop requested before scrape started");
            return Ok(NodeOutcome::Cancelled);
        }

        self.scrape(node).await
    }

    /// Fetch everything first and only then write, so a node either
    /// contributes its full metric set or nothing.
    async fn scrape(&self, node: &Node) -> Result<NodeOutcome> {
        let client = self.client.as_ref();
        let name = node.name.as_str();

        let cpu_frequency = if self.full_discovery {
            let freq = client
                .cpu_frequency(node, &self.stop)
                .await
                .map_err(|e| MonitorError::fetch(name, "cpufreq", e))?;
            Some(freq)
        } else {
            None
        };

        let address = node.monitor_address()?;
        let summary = client
            .summary(address, name, &self.stop)
            .await
            .map_err(|e| MonitorError::fetch(name, "summary", e))?;

        let cache_used = client.has_cache_been_used(address);
        if cache_used && !self.full_discovery {
            // Reachable during full discovery but not now; the next full
            // discovery refreshes the node.
            self.logger.log_sample_skipped(name);
            return Ok(NodeOutcome::SkippedCached);
        }

        let thresholds = if self.full_discovery {
            client
                .thresholds(address, name, &self.stop)
                .await
                .map_err(|e| MonitorError::fetch(name, "thresholds", e))?
        } else {
            Vec::new()
        };

        let counter_families = if self.features.throttling_metrics {
            client
                .throttling_counters(address, name, &self.stop)
                .await
                .map_err(|e| MonitorError::fetch(name, "throttling counters", e))?
        } else {
            Default::default()
        };

        let timestamp = chrono::Utc::now().timestamp_millis();
        let parser = StatsParser::new(
            self.sink.clone(),
            self.full_discovery,
            self.features,
            timestamp,
        );
        let node_key = keys::node_key(node);

        if cache_used {
            self.logger.log_cache_used(name);
            parser.parse_cache_used(&node_key);
        }
        if let Some(freq) = cpu_frequency {
            parser.parse_node_cpu_freq(&node_key, freq);
        }
        parser.parse_node_stats(&summary.node, &thresholds);

        if self.features.throttling_metrics {
            if !counter_families.contains_key(CONTAINER_CPU_THROTTLED_TOTAL) {
                debug!(node = %name, "No throttling metrics found");
            }
            let written = parser.parse_throttling(&counter_families);
            debug!(node = %name, containers = written, "Throttling metrics generated");
        }

        parser.parse_pod_stats(&summary.pods);

        debug!(node = %name, pods = summary.pods.len(), "Finished scrape node");
        Ok(NodeOutcome::Scraped)
    }
}
