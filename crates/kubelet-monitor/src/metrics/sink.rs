//! Concurrent metric sink
//!
//! One sink is created per discovery cycle and shared by every scrape
//! task of that cycle. Writers never block each other beyond the shard
//! lock of the entry they touch.

use super::{EntityType, MetricEntry, MetricId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

/// Collection of metric entries keyed by identity
///
/// Cloning is cheap and yields a handle to the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct MetricSink {
    entries: Arc<DashMap<MetricId, MetricEntry>>,
}

impl MetricSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one entry, merging into an existing entry with the same identity
    pub fn add_entry(&self, entry: MetricEntry) {
        match self.entries.entry(entry.id.clone()) {
            Entry::Occupied(mut existing) => {
                trace!(id = %entry.id, "Merging into existing metric entry");
                existing.get_mut().value.merge(entry.value);
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }

    /// Add several entries
    pub fn add_entries(&self, entries: impl IntoIterator<Item = MetricEntry>) {
        for entry in entries {
            self.add_entry(entry);
        }
    }

    /// Look up an entry by identity
    pub fn get(&self, id: &MetricId) -> Option<MetricEntry> {
        self.entries.get(id).map(|r| r.value().clone())
    }

    /// All entries of one entity
    pub fn entries_for(&self, entity_type: EntityType, entity_key: &str) -> Vec<MetricEntry> {
        self.entries
            .iter()
            .filter(|r| r.key().entity_type == entity_type && r.key().entity_key == entity_key)
            .map(|r| r.value().clone())
            .collect()
    }

    /// Snapshot of every entry in the sink
    pub fn entries(&self) -> Vec<MetricEntry> {
        self.entries.iter().map(|r| r.value().clone()).collect()
    }

    /// Number of distinct metric identities
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the sink holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricRole, MetricType, MetricValue, Point};

    fn cpu_used(key: &str, value: f64, timestamp: i64) -> MetricEntry {
        MetricEntry::resource(
            EntityType::Container,
            key,
            MetricType::Cpu,
            MetricRole::Used,
            MetricValue::Points(vec![Point { value, timestamp }]),
        )
    }

    #[test]
    fn test_add_and_get() {
        let sink = MetricSink::new();
        sink.add_entry(cpu_used("ns/pod/c", 0.5, 1));

        let id = MetricId::new(
            EntityType::Container,
            "ns/pod/c",
            MetricType::Cpu,
            MetricRole::Used,
        );
        let entry = sink.get(&id).unwrap();
        assert_eq!(entry.value.as_points().unwrap()[0].value, 0.5);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_same_identity_appends_samples() {
        let sink = MetricSink::new();
        sink.add_entries(vec![cpu_used("ns/pod/c", 0.5, 1), cpu_used("ns/pod/c", 0.7, 2)]);

        assert_eq!(sink.len(), 1);
        let entry = &sink.entries()[0];
        let points = entry.value.as_points().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, 1);
        assert_eq!(points[1].timestamp, 2);
    }

    #[test]
    fn test_capacity_latest_write_wins() {
        let sink = MetricSink::new();
        for capacity in [100.0, 250.0] {
            sink.add_entry(MetricEntry::resource(
                EntityType::Node,
                "node-1",
                MetricType::VStorage,
                MetricRole::Capacity,
                MetricValue::Scalar(capacity),
            ));
        }

        let id = MetricId::new(
            EntityType::Node,
            "node-1",
            MetricType::VStorage,
            MetricRole::Capacity,
        );
        assert_eq!(sink.get(&id).unwrap().value.as_scalar(), Some(250.0));
    }

    #[test]
    fn test_entries_for_entity() {
        let sink = MetricSink::new();
        sink.add_entry(cpu_used("ns/a/c", 0.1, 1));
        sink.add_entry(cpu_used("ns/b/c", 0.2, 1));

        let entries = sink.entries_for(EntityType::Container, "ns/a/c");
        assert_eq!(entries.len(), 1);
        assert!(sink.entries_for(EntityType::Pod, "ns/a/c").is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers() {
        let sink = MetricSink::new();
        let mut handles = Vec::new();

        for task in 0..16 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                for sample in 0..50 {
                    sink.add_entry(cpu_used(&format!("ns/pod-{}/c", task % 4), 1.0, sample));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(sink.len(), 4);
        let total_points: usize = sink
            .entries()
            .iter()
            .map(|e| e.value.as_points().unwrap().len())
            .sum();
        assert_eq!(total_points, 16 * 50);
    }
}
