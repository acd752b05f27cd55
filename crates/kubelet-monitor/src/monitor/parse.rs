//! Translation of raw node statistics into sink entries
//!
//! A [`StatsParser`] is built per scrape: it carries the scrape timestamp
//! and the discovery mode, so every generator call made for that node is
//! decided against the same mode.

use super::generator::MetricGenerator;
use super::keys;
use super::stats::{CounterFamily, FsStats, NodeStats, PodStats, Threshold, VolumeStats};
use super::throttling::correlate;
use super::units::{
    bytes_to_kilobytes, bytes_to_megabytes, derive_node_thresholds, nano_to_unit, NodeCapacity,
};
use crate::config::FeatureGates;
use crate::metrics::{EntityType, MetricSink, MetricType};
use std::collections::HashMap;
use tracing::debug;

fn raw(value: Option<u64>) -> f64 {
    value.map(|v| v as f64).unwrap_or(0.0)
}

fn fs_field(fs: Option<&FsStats>, field: impl Fn(&FsStats) -> Option<u64>) -> f64 {
    raw(fs.and_then(field))
}

/// Parses one node's statistics into a cycle's sink
pub struct StatsParser {
    generator: MetricGenerator,
    full_discovery: bool,
    features: FeatureGates,
    timestamp: i64,
}

impl StatsParser {
    pub fn new(
        sink: MetricSink,
        full_discovery: bool,
        features: FeatureGates,
        timestamp: i64,
    ) -> Self {
        Self {
            generator: MetricGenerator::new(sink),
            full_discovery,
            features,
            timestamp,
        }
    }

    /// Record the node CPU frequency
    pub fn parse_node_cpu_freq(&self, node_key: &str, cpu_frequency_mhz: f64) {
        debug!(node = %node_key, cpu_frequency_mhz, "Node CPU frequency");
        self.generator.gen_state(
            EntityType::Node,
            node_key,
            MetricType::CpuFrequency,
            cpu_frequency_mhz,
        );
    }

    /// Record that the node agent answered from cache
    pub fn parse_cache_used(&self, node_key: &str) {
        self.generator
            .gen_state(EntityType::Node, node_key, MetricType::NodeCacheUsed, 1.0);
    }

    /// Node usage, plus filesystems and thresholds in full discovery
    pub fn parse_node_stats(&self, stats: &NodeStats, thresholds: &[Threshold]) {
        let cpu_usage_core = nano_to_unit(raw(stats.cpu.as_ref().and_then(|c| c.usage_nano_cores)));
        let memory = stats.memory.as_ref();
        let memory_working_set_bytes = raw(memory.and_then(|m| m.working_set_bytes));
        let memory_available_bytes = raw(memory.and_then(|m| m.available_bytes));

        let rootfs = stats.fs.as_ref();
        let rootfs_capacity_bytes = fs_field(rootfs, |f| f.capacity_bytes);
        let rootfs_used_bytes = fs_field(rootfs, |f| f.used_bytes);
        let rootfs_available_bytes = fs_field(rootfs, |f| f.available_bytes);

        // Image layers shared between images are counted once per image in
        // usedBytes, which can exceed capacity; derive usage from available.
        let imagefs = stats.runtime.as_ref().and_then(|r| r.image_fs.as_ref());
        let imagefs_capacity_bytes = fs_field(imagefs, |f| f.capacity_bytes);
        let imagefs_available_bytes = fs_field(imagefs, |f| f.available_bytes);

        let key = keys::node_stats_key(stats);
        let memory_working_set_kb = bytes_to_kilobytes(memory_working_set_bytes);
        let memory_capacity_bytes = memory_available_bytes + memory_working_set_bytes;

        debug!(
            node = %key,
            cpu_usage_core,
            memory_working_set_kb,
            memory_capacity_bytes,
            "Node usage"
        );
        self.generator.gen_used(
            EntityType::Node,
            &key,
            cpu_usage_core,
            memory_working_set_kb,
            self.timestamp,
        );

        if !self.full_discovery {
            return;
        }

        let imagefs_key = keys::imagefs_key(&key);
        self.generator.gen_filesystem(
            EntityType::Node,
            &key,
            bytes_to_megabytes(rootfs_capacity_bytes),
            0.0,
            bytes_to_megabytes(rootfs_available_bytes),
        );
        self.generator.gen_filesystem(
            EntityType::Node,
            &imagefs_key,
            bytes_to_megabytes(imagefs_capacity_bytes),
            0.0,
            bytes_to_megabytes(imagefs_available_bytes),
        );
        self.parse_threshold_values(
            &key,
            NodeCapacity {
                memory: memory_capacity_bytes,
                rootfs: rootfs_capacity_bytes,
                imagefs: imagefs_capacity_bytes,
            },
            thresholds,
        );

        debug!(
            node = %key,
            rootfs_capacity_mb = bytes_to_megabytes(rootfs_capacity_bytes),
            rootfs_used_mb = bytes_to_megabytes(rootfs_used_bytes),
            imagefs_capacity_mb = bytes_to_megabytes(imagefs_capacity_bytes),
            imagefs_used_mb = bytes_to_megabytes(imagefs_capacity_bytes - imagefs_available_bytes),
            "Node filesystems"
        );
    }

    fn parse_threshold_values(&self, key: &str, capacity: NodeCapacity, thresholds: &[Threshold]) {
        let derived = derive_node_thresholds(thresholds, capacity);
        let imagefs_key = keys::imagefs_key(key);

        if let Some(memory) = derived.memory {
            self.generator
                .gen_threshold(EntityType::Node, key, MetricType::Memory, memory);
        }
        self.generator
            .gen_threshold(EntityType::Node, key, MetricType::VStorage, derived.rootfs);
        self.generator.gen_threshold(
            EntityType::Node,
            &imagefs_key,
            MetricType::VStorage,
            derived.imagefs,
        );

        debug!(
            node = %key,
            memory_threshold = ?derived.memory,
            rootfs_threshold = derived.rootfs,
            imagefs_threshold = derived.imagefs,
            "Node thresholds"
        );
    }

    /// Per-container throttling counters; returns the number of entries
    /// written
    pub fn parse_throttling(&self, families: &HashMap<String, CounterFamily>) -> usize {
        let mut written = 0;
        for (container_key, metric) in correlate(families) {
            match metric.complete() {
                Some((throttled, total)) => {
                    debug!(
                        container = %container_key,
                        cpu_throttled = throttled,
                        cpu_total = total,
                        "Throttling metrics"
                    );
                    self.generator.gen_throttling(
                        EntityType::Container,
                        &container_key,
                        throttled,
                        total,
                        self.timestamp,
                    );
                    written += 1;
                }
                None => debug!(
                    container = %container_key,
                    "Incomplete throttling counters, skipping"
                ),
            }
        }
        written
    }

    /// Pod, container and application usage, plus consumer count,
    /// ephemeral storage and volumes in full discovery
    pub fn parse_pod_stats(&self, pods: &[PodStats]) {
        for pod in pods {
            let key = keys::pod_key(&pod.pod_ref);
            let (cpu_used, memory_used) = self.parse_container_stats(pod, &key);

            let ephemeral = pod.ephemeral_storage.as_ref();
            if ephemeral.is_none() {
                debug!(pod = %key, "Ephemeral fs status is not available");
            }
            let ephemeral_capacity = bytes_to_megabytes(fs_field(ephemeral, |f| f.capacity_bytes));
            let ephemeral_used = bytes_to_megabytes(fs_field(ephemeral, |f| f.used_bytes));

            debug!(
                pod = %key,
                cpu_used,
                memory_used_kb = memory_used,
                ephemeral_capacity_mb = ephemeral_capacity,
                ephemeral_used_mb = ephemeral_used,
                "Pod usage"
            );
            self.generator
                .gen_used(EntityType::Pod, &key, cpu_used, memory_used, self.timestamp);

            if self.full_discovery {
                self.generator.gen_consumer_count(EntityType::Pod, &key);
                self.generator.gen_filesystem(
                    EntityType::Pod,
                    &key,
                    ephemeral_capacity,
                    ephemeral_used,
                    0.0,
                );
                if self.features.persistent_volumes {
                    self.parse_volume_stats(&pod.volume_stats, &key);
                }
            }
        }
    }

    fn parse_volume_stats(&self, volumes: &[VolumeStats], pod_key: &str) {
        for volume in volumes {
            let capacity = bytes_to_megabytes(raw(volume.capacity_bytes));
            let used = bytes_to_megabytes(raw(volume.used_bytes));
            let volume_key = keys::pod_volume_key(pod_key, &volume.name);

            // TODO: emit capacity on a volume entity type once downstream
            // consumers accept one; both roles ride on the pod for now.
            self.generator
                .gen_volume(EntityType::Pod, &volume_key, capacity, used);

            debug!(
                pod = %pod_key,
                volume = %volume.name,
                capacity_mb = capacity,
                used_mb = used,
                "Volume usage"
            );
        }
    }

    /// Container and application usage; returns the pod totals over the
    /// containers that reported both CPU and memory
    fn parse_container_stats(&self, pod: &PodStats, pod_key: &str) -> (f64, f64) {
        let mut total_cpu = 0.0;
        let mut total_memory = 0.0;

        for container in &pod.containers {
            let Some(nano_cores) = container.cpu.as_ref().and_then(|c| c.usage_nano_cores) else {
                continue;
            };
            let Some(working_set) = container
                .memory
                .as_ref()
                .and_then(|m| m.working_set_bytes)
            else {
                continue;
            };

            let cpu_used = nano_to_unit(nano_cores as f64);
            let memory_used = bytes_to_kilobytes(working_set as f64);
            total_cpu += cpu_used;
            total_memory += memory_used;

            let container_key = keys::container_key(pod_key, &container.name);
            self.generator.gen_used(
                EntityType::Container,
                &container_key,
                cpu_used,
                memory_used,
                self.timestamp,
            );
            self.generator.gen_request_used(
                EntityType::Container,
                &container_key,
                cpu_used,
                memory_used,
                self.timestamp,
            );

            let app_key = keys::application_key(&container_key);
            self.generator.gen_used(
                EntityType::Application,
                &app_key,
                cpu_used,
                memory_used,
                self.timestamp,
            );

            debug!(
                container = %container_key,
                cpu_used,
                memory_used_kb = memory_used,
                "Container usage"
            );
        }

        (total_cpu, total_memory)
    }
}
