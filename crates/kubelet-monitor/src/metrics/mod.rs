//! Uniform metric model shared with downstream consumers
//!
//! Every value scraped from a node agent ends up as a [`MetricEntry`]
//! identified by entity type, entity key, metric type and role, and is
//! deposited into a [`MetricSink`].

mod sink;

pub use sink::MetricSink;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of monitored object a metric belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Node,
    Pod,
    Container,
    Application,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Node => "Node",
            EntityType::Pod => "Pod",
            EntityType::Container => "Container",
            EntityType::Application => "Application",
        };
        f.write_str(name)
    }
}

/// Commodity a metric describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricType {
    /// CPU usage in cores
    Cpu,
    /// Memory working set in kilobytes
    Memory,
    /// CPU usage counted against the container request
    CpuRequest,
    /// Memory usage counted against the container request
    MemoryRequest,
    /// Root, image or ephemeral filesystem storage in megabytes
    VStorage,
    /// Mounted volume storage in megabytes
    StorageAmount,
    /// Number of consumers of a node-level commodity
    NumPods,
    /// Node CPU frequency in MHz
    CpuFrequency,
    /// Cumulative CPU throttling counters
    VCpuThrottling,
    /// Set when the node agent answered from its cache
    NodeCacheUsed,
}

/// Role of a value within its commodity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricRole {
    Used,
    Capacity,
    Available,
    Threshold,
    /// Plain state of the entity, with no used/capacity meaning
    State,
}

/// A single timestamped sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub value: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Cumulative throttling counters observed at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrottlingCumulative {
    pub throttled: f64,
    pub total: f64,
    pub timestamp: i64,
}

impl ThrottlingCumulative {
    /// Fraction of periods that were throttled, if any periods were counted
    pub fn ratio(&self) -> Option<f64> {
        if self.total > 0.0 {
            Some(self.throttled / self.total)
        } else {
            None
        }
    }
}

/// Value carried by a metric entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Scalar(f64),
    Points(Vec<Point>),
    Throttling(Vec<ThrottlingCumulative>),
}

impl MetricValue {
    /// Fold a later write into this value.
    ///
    /// Sample sequences are extended; scalars and mismatched kinds are
    /// replaced by the latest write.
    pub fn merge(&mut self, later: MetricValue) {
        match (self, later) {
            (MetricValue::Points(existing), MetricValue::Points(more)) => existing.extend(more),
            (MetricValue::Throttling(existing), MetricValue::Throttling(more)) => {
                existing.extend(more)
            }
            (slot, later) => *slot = later,
        }
    }

    /// Scalar value, if this is a scalar snapshot
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Samples, if this is a sample sequence
    pub fn as_points(&self) -> Option<&[Point]> {
        match self {
            MetricValue::Points(points) => Some(points),
            _ => None,
        }
    }

    /// Throttling records, if this is a throttling value
    pub fn as_throttling(&self) -> Option<&[ThrottlingCumulative]> {
        match self {
            MetricValue::Throttling(records) => Some(records),
            _ => None,
        }
    }
}

/// Identity of a metric entry, unique within one sink
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricId {
    pub entity_type: EntityType,
    pub entity_key: String,
    pub metric_type: MetricType,
    pub role: MetricRole,
}

impl MetricId {
    pub fn new(
        entity_type: EntityType,
        entity_key: impl Into<String>,
        metric_type: MetricType,
        role: MetricRole,
    ) -> Self {
        Self {
            entity_type,
            entity_key: entity_key.into(),
            metric_type,
            role,
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:?}-{:?}",
            self.entity_type, self.entity_key, self.metric_type, self.role
        )
    }
}

/// A metric for one entity, as stored in the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub id: MetricId,
    pub value: MetricValue,
}

impl MetricEntry {
    /// Resource metric with an explicit role
    pub fn resource(
        entity_type: EntityType,
        entity_key: impl Into<String>,
        metric_type: MetricType,
        role: MetricRole,
        value: MetricValue,
    ) -> Self {
        Self {
            id: MetricId::new(entity_type, entity_key, metric_type, role),
            value,
        }
    }

    /// State metric holding a scalar snapshot
    pub fn state(
        entity_type: EntityType,
        entity_key: impl Into<String>,
        metric_type: MetricType,
        value: f64,
    ) -> Self {
        Self::resource(
            entity_type,
            entity_key,
            metric_type,
            MetricRole::State,
            MetricValue::Scalar(value),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_extends_points() {
        let mut value = MetricValue::Points(vec![Point {
            value: 1.0,
            timestamp: 10,
        }]);
        value.merge(MetricValue::Points(vec![Point {
            value: 2.0,
            timestamp: 20,
        }]));

        let points = value.as_points().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].value, 2.0);
    }

    #[test]
    fn test_merge_replaces_scalar() {
        let mut value = MetricValue::Scalar(100.0);
        value.merge(MetricValue::Scalar(200.0));
        assert_eq!(value.as_scalar(), Some(200.0));
    }

    #[test]
    fn test_merge_mismatched_kind_takes_latest() {
        let mut value = MetricValue::Scalar(1.0);
        value.merge(MetricValue::Points(vec![]));
        assert!(value.as_points().is_some());
    }

    #[test]
    fn test_throttling_ratio() {
        let record = ThrottlingCumulative {
            throttled: 5.0,
            total: 10.0,
            timestamp: 0,
        };
        assert_eq!(record.ratio(), Some(0.5));

        let empty = ThrottlingCumulative {
            throttled: 5.0,
            total: 0.0,
            timestamp: 0,
        };
        assert_eq!(empty.ratio(), None);
    }

    #[test]
    fn test_metric_id_display() {
        let id = MetricId::new(EntityType::Pod, "ns/pod", MetricType::Cpu, MetricRole::Used);
        assert_eq!(id.to_string(), "Pod-ns/pod-Cpu-Used");
    }
}
