//! Raw statistics as reported by a node agent
//!
//! These types mirror the node agent's summary API closely enough to be
//! deserialized straight from its JSON. Every numeric field is optional:
//! agents omit whatever they could not measure.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cluster node handed to the monitor by the discovery layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

/// One address a node advertises
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "type")]
    pub kind: NodeAddressKind,
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAddressKind {
    InternalIP,
    ExternalIP,
    Hostname,
    #[serde(other)]
    Other,
}

impl Node {
    pub fn new(name: impl Into<String>, addresses: Vec<NodeAddress>) -> Self {
        Self {
            name: name.into(),
            addresses,
        }
    }

    /// Address used to reach the node agent
    ///
    /// Internal addresses are preferred, then external ones, then the
    /// hostname.
    pub fn monitor_address(&self) -> Result<&str> {
        [
            NodeAddressKind::InternalIP,
            NodeAddressKind::ExternalIP,
            NodeAddressKind::Hostname,
        ]
        .iter()
        .find_map(|kind| {
            self.addresses
                .iter()
                .find(|a| a.kind == *kind && !a.address.is_empty())
        })
        .map(|a| a.address.as_str())
        .ok_or_else(|| MonitorError::NoMonitorAddress {
            node: self.name.clone(),
        })
    }
}

impl NodeAddress {
    pub fn internal(address: impl Into<String>) -> Self {
        Self {
            kind: NodeAddressKind::InternalIP,
            address: address.into(),
        }
    }
}

/// Node and pod statistics from one summary request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub node: NodeStats,
    #[serde(default)]
    pub pods: Vec<PodStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub node_name: String,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
    pub fs: Option<FsStats>,
    pub runtime: Option<RuntimeStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    pub image_fs: Option<FsStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub usage_nano_cores: Option<u64>,
    pub usage_core_nano_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub available_bytes: Option<u64>,
    pub usage_bytes: Option<u64>,
    pub working_set_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsStats {
    pub available_bytes: Option<u64>,
    pub capacity_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStats {
    pub pod_ref: PodReference,
    #[serde(default)]
    pub containers: Vec<ContainerStats>,
    #[serde(default, rename = "volume")]
    pub volume_stats: Vec<VolumeStats>,
    #[serde(rename = "ephemeral-storage")]
    pub ephemeral_storage: Option<FsStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodReference {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStats {
    pub name: String,
    pub cpu: Option<CpuStats>,
    pub memory: Option<MemoryStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStats {
    pub name: String,
    pub available_bytes: Option<u64>,
    pub capacity_bytes: Option<u64>,
    pub used_bytes: Option<u64>,
}

/// Eviction signal a threshold applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "memory.available")]
    MemoryAvailable,
    #[serde(rename = "nodefs.available")]
    NodeFsAvailable,
    #[serde(rename = "imagefs.available")]
    ImageFsAvailable,
    #[serde(untagged)]
    Other(String),
}

/// Eviction threshold value, either an absolute quantity or a percentage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdValue {
    /// Absolute quantity in bytes
    pub quantity: Option<f64>,
    /// Fraction of capacity in `[0, 1]`; zero means unset
    #[serde(default)]
    pub percentage: f64,
}

/// Eviction threshold configured on a node agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub signal: Signal,
    pub value: ThresholdValue,
}

impl Threshold {
    pub fn quantity(signal: Signal, bytes: f64) -> Self {
        Self {
            signal,
            value: ThresholdValue {
                quantity: Some(bytes),
                percentage: 0.0,
            },
        }
    }

    pub fn percentage(signal: Signal, fraction: f64) -> Self {
        Self {
            signal,
            value: ThresholdValue {
                quantity: None,
                percentage: fraction,
            },
        }
    }
}

/// Type of a reported metric family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterKind {
    Counter,
    Gauge,
    Summary,
    Histogram,
    Untyped,
}

/// One labelled data point of a metric family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterPoint {
    pub labels: HashMap<String, String>,
    pub value: f64,
}

impl CounterPoint {
    pub fn new<'a>(labels: impl IntoIterator<Item = (&'a str, &'a str)>, value: f64) -> Self {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value,
        }
    }
}

/// Metric family as scraped from the node agent's telemetry endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterFamily {
    pub kind: CounterKind,
    #[serde(default)]
    pub points: Vec<CounterPoint>,
}

impl CounterFamily {
    pub fn counter(points: Vec<CounterPoint>) -> Self {
        Self {
            kind: CounterKind::Counter,
            points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_address_prefers_internal() {
        let node = Node::new(
            "node-1",
            vec![
                NodeAddress {
                    kind: NodeAddressKind::Hostname,
                    address: "node-1.local".to_string(),
                },
                NodeAddress {
                    kind: NodeAddressKind::ExternalIP,
                    address: "203.0.113.7".to_string(),
                },
                NodeAddress::internal("10.0.0.7"),
            ],
        );
        assert_eq!(node.monitor_address().unwrap(), "10.0.0.7");
    }

    #[test]
    fn test_monitor_address_falls_back_to_hostname() {
        let node = Node::new(
            "node-1",
            vec![NodeAddress {
                kind: NodeAddressKind::Hostname,
                address: "node-1.local".to_string(),
            }],
        );
        assert_eq!(node.monitor_address().unwrap(), "node-1.local");
    }

    #[test]
    fn test_monitor_address_missing() {
        let node = Node::new("node-1", vec![]);
        assert!(matches!(
            node.monitor_address(),
            Err(MonitorError::NoMonitorAddress { .. })
        ));
    }

    #[test]
    fn test_deserialize_summary() {
        let json = r#"{
            "node": {
                "nodeName": "worker-1",
                "cpu": {"usageNanoCores": 1500000000},
                "memory": {"availableBytes": 6442450944, "workingSetBytes": 2147483648},
                "fs": {"availableBytes": 10, "capacityBytes": 100, "usedBytes": 90},
                "runtime": {"imageFs": {"availableBytes": 40, "capacityBytes": 200, "usedBytes": 300}}
            },
            "pods": [{
                "podRef": {"name": "web-0", "namespace": "shop", "uid": "abc"},
                "containers": [{
                    "name": "nginx",
                    "cpu": {"usageNanoCores": 250000000},
                    "memory": {"workingSetBytes": 1048576}
                }],
                "volume": [{"name": "data", "capacityBytes": 1073741824, "usedBytes": 536870912}],
                "ephemeral-storage": {"capacityBytes": 2097152, "usedBytes": 1048576}
            }]
        }"#;

        let summary: Summary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.node.node_name, "worker-1");
        assert_eq!(
            summary.node.cpu.as_ref().unwrap().usage_nano_cores,
            Some(1_500_000_000)
        );
        assert_eq!(
            summary
                .node
                .runtime
                .as_ref()
                .unwrap()
                .image_fs
                .as_ref()
                .unwrap()
                .available_bytes,
            Some(40)
        );

        let pod = &summary.pods[0];
        assert_eq!(pod.pod_ref.namespace, "shop");
        assert_eq!(pod.containers[0].name, "nginx");
        assert_eq!(pod.volume_stats[0].name, "data");
        assert_eq!(
            pod.ephemeral_storage.as_ref().unwrap().used_bytes,
            Some(1_048_576)
        );
    }

    #[test]
    fn test_deserialize_pod_without_optional_sections() {
        let json = r#"{"podRef": {"name": "p", "namespace": "ns"}}"#;
        let pod: PodStats = serde_json::from_str(json).unwrap();
        assert!(pod.containers.is_empty());
        assert!(pod.volume_stats.is_empty());
        assert!(pod.ephemeral_storage.is_none());
    }

    #[test]
    fn test_deserialize_signals() {
        let signal: Signal = serde_json::from_str(r#""memory.available""#).unwrap();
        assert_eq!(signal, Signal::MemoryAvailable);

        let other: Signal = serde_json::from_str(r#""pid.available""#).unwrap();
        assert_eq!(other, Signal::Other("pid.available".to_string()));
    }
}
