//! Resource metric discovery from node agents
//!
//! This module scrapes CPU, memory, filesystem, volume and CPU throttling
//! statistics for every node, pod and container of a discovery cycle and
//! normalizes them into the shared metric model.

mod client;
mod generator;
mod keys;
mod parse;
mod scrape;
mod stats;
mod throttling;
mod units;


pub use async_trait::async_trait;
pub use client::StatsClient;
pub use generator::MetricGenerator;
pub use keys::{
    application_key, container_key, imagefs_key, node_key, node_stats_key, pod_key,
    pod_volume_key,
};
pub use parse::StatsParser;
pub use scrape::{CycleReport, KubeletMonitor, NodeOutcome, MONITOR_SOURCE};
pub use stats::{
    ContainerStats, CounterFamily, CounterKind, CounterPoint, CpuStats, FsStats, MemoryStats,
    Node, NodeAddress, NodeAddressKind, NodeStats, PodReference, PodStats, RuntimeStats, Signal,
    Summary, Threshold, ThresholdValue, VolumeStats,
};
pub use throttling::{
    container_identity, correlate, ThrottlingMetric, CONTAINER_CPU_THROTTLED_TOTAL,
    CONTAINER_CPU_TOTAL,
};
pub use units::{
    bytes_to_kilobytes, bytes_to_megabytes, derive_node_thresholds, megabytes_to_bytes,
    nano_to_unit, threshold_percentile, NodeCapacity, NodeThresholds,
    DEFAULT_IMAGEFS_THRESHOLD_PERCENT, DEFAULT_MEMORY_THRESHOLD_MEGABYTES,
    DEFAULT_ROOTFS_THRESHOLD_PERCENT,
};
