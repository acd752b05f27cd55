//! Kubelet monitor library
//!
//! This crate provides the resource metric discovery engine of a cluster
//! monitoring agent:
//! - Concurrent per-node scraping with cooperative cancellation
//! - Normalization of node, pod and container statistics
//! - CPU throttling correlation and eviction threshold derivation
//! - A concurrent metric sink handed to downstream consumers

pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod observability;

pub use crate::config::{FeatureGates, MonitorConfig};
pub use error::MonitorError;
pub use metrics::{
    EntityType, MetricEntry, MetricId, MetricRole, MetricSink, MetricType, MetricValue, Point,
    ThrottlingCumulative,
};
pub use monitor::{CycleReport, KubeletMonitor, Node, StatsClient};
pub use observability::{init_logging, MonitorMetrics, StructuredLogger};
pub use tokio_util::sync::CancellationToken;
