//! Unit conversion and eviction-threshold derivation
//!
//! Raw values from the node agent come in nanocores and bytes. Everything
//! written into the sink uses cores, kilobytes (memory) and megabytes
//! (storage). Thresholds are expressed as a percentage of capacity.

use super::stats::{Signal, Threshold, ThresholdValue};
use tracing::{debug, warn};

const NANO: f64 = 1_000_000_000.0;
const KILO: f64 = 1024.0;
const MEGA: f64 = 1024.0 * 1024.0;

/// Memory eviction threshold used when none usable is configured
pub const DEFAULT_MEMORY_THRESHOLD_MEGABYTES: f64 = 100.0;
/// Root filesystem threshold used when none usable is configured
pub const DEFAULT_ROOTFS_THRESHOLD_PERCENT: f64 = 10.0;
/// Image filesystem threshold used when none usable is configured
pub const DEFAULT_IMAGEFS_THRESHOLD_PERCENT: f64 = 15.0;

/// Convert nanocores to cores
pub fn nano_to_unit(nano: f64) -> f64 {
    nano / NANO
}

/// Convert bytes to base-2 kilobytes
pub fn bytes_to_kilobytes(bytes: f64) -> f64 {
    bytes / KILO
}

/// Convert bytes to base-2 megabytes
pub fn bytes_to_megabytes(bytes: f64) -> f64 {
    bytes / MEGA
}

/// Convert base-2 megabytes to bytes
pub fn megabytes_to_bytes(megabytes: f64) -> f64 {
    megabytes * MEGA
}

/// Percentage of `capacity` a threshold value stands for
///
/// Percentage signals arrive as a fraction of one. Quantities are divided
/// by capacity. A quantity against a non-positive capacity yields 0, which
/// callers treat as unusable.
pub fn threshold_percentile(value: &ThresholdValue, capacity: f64) -> f64 {
    if value.percentage != 0.0 {
        return value.percentage * 100.0;
    }
    match value.quantity {
        Some(quantity) if capacity > 0.0 => quantity * 100.0 / capacity,
        _ => 0.0,
    }
}

fn in_range(percent: f64) -> bool {
    percent > 0.0 && percent < 100.0
}

/// Capacities the node thresholds are relative to, all in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeCapacity {
    pub memory: f64,
    pub rootfs: f64,
    pub imagefs: f64,
}

/// Threshold percentages derived for one node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeThresholds {
    /// `None` when neither a configured value nor the default could be
    /// expressed against the node's memory capacity
    pub memory: Option<f64>,
    pub rootfs: f64,
    pub imagefs: f64,
}

/// Derive memory, root filesystem and image filesystem thresholds
///
/// Values outside `(0, 100)` are replaced by defaults: 100 MiB relative to
/// memory capacity, 10% for the root filesystem and 15% for the image
/// filesystem.
pub fn derive_node_thresholds(thresholds: &[Threshold], capacity: NodeCapacity) -> NodeThresholds {
    let mut memory = 0.0;
    let mut rootfs = 0.0;
    let mut imagefs = 0.0;

    for threshold in thresholds {
        match &threshold.signal {
            Signal::MemoryAvailable => {
                memory = threshold_percentile(&threshold.value, capacity.memory)
            }
            Signal::NodeFsAvailable => {
                rootfs = threshold_percentile(&threshold.value, capacity.rootfs)
            }
            Signal::ImageFsAvailable => {
                imagefs = threshold_percentile(&threshold.value, capacity.imagefs)
            }
            Signal::Other(name) => debug!(signal = %name, "Ignoring eviction signal"),
        }
    }

    let memory = if in_range(memory) {
        Some(memory)
    } else {
        let fallback =
            megabytes_to_bytes(DEFAULT_MEMORY_THRESHOLD_MEGABYTES) * 100.0 / capacity.memory;
        if in_range(fallback) {
            Some(fallback)
        } else {
            warn!(
                memory_capacity_bytes = capacity.memory,
                "Cannot express default memory threshold against node capacity"
            );
            None
        }
    };
    if !in_range(rootfs) {
        rootfs = DEFAULT_ROOTFS_THRESHOLD_PERCENT;
    }
    if !in_range(imagefs) {
        imagefs = DEFAULT_IMAGEFS_THRESHOLD_PERCENT;
    }

    NodeThresholds {
        memory,
        rootfs,
        imagefs,
    }
}
