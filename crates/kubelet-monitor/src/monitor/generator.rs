//! Metric entry generation
//!
//! Thin constructors that translate already-normalized values into sink
//! entries. Callers pass one timestamp per scrape so that commodities
//! sampled together stay comparable downstream.

use crate::metrics::{
    EntityType, MetricEntry, MetricRole, MetricSink, MetricType, MetricValue, Point,
    ThrottlingCumulative,
};

/// Writes metric entries into a cycle's sink
#[derive(Debug, Clone)]
pub struct MetricGenerator {
    sink: MetricSink,
}

impl MetricGenerator {
    pub fn new(sink: MetricSink) -> Self {
        Self { sink }
    }

    fn sample(
        &self,
        entity_type: EntityType,
        key: &str,
        metric_type: MetricType,
        value: f64,
        timestamp: i64,
    ) -> MetricEntry {
        MetricEntry::resource(
            entity_type,
            key,
            metric_type,
            MetricRole::Used,
            MetricValue::Points(vec![Point { value, timestamp }]),
        )
    }

    fn scalar(
        &self,
        entity_type: EntityType,
        key: &str,
        metric_type: MetricType,
        role: MetricRole,
        value: f64,
    ) -> MetricEntry {
        MetricEntry::resource(
            entity_type,
            key,
            metric_type,
            role,
            MetricValue::Scalar(value),
        )
    }

    /// CPU (cores) and memory (KB) used samples
    pub fn gen_used(
        &self,
        entity_type: EntityType,
        key: &str,
        cpu: f64,
        memory: f64,
        timestamp: i64,
    ) {
        self.sink.add_entries([
            self.sample(entity_type, key, MetricType::Cpu, cpu, timestamp),
            self.sample(entity_type, key, MetricType::Memory, memory, timestamp),
        ]);
    }

    /// CPU and memory used samples counted against the request
    pub fn gen_request_used(
        &self,
        entity_type: EntityType,
        key: &str,
        cpu: f64,
        memory: f64,
        timestamp: i64,
    ) {
        self.sink.add_entries([
            self.sample(entity_type, key, MetricType::CpuRequest, cpu, timestamp),
            self.sample(entity_type, key, MetricType::MemoryRequest, memory, timestamp),
        ]);
    }

    /// Filesystem capacity plus available (nodes) or used (everything else)
    ///
    /// Nodes report remaining headroom while pods report consumption
    /// against their ephemeral-storage request.
    pub fn gen_filesystem(
        &self,
        entity_type: EntityType,
        key: &str,
        capacity: f64,
        used: f64,
        available: f64,
    ) {
        self.sink.add_entry(self.scalar(
            entity_type,
            key,
            MetricType::VStorage,
            MetricRole::Capacity,
            capacity,
        ));
        if entity_type == EntityType::Node {
            self.sink.add_entry(self.scalar(
                entity_type,
                key,
                MetricType::VStorage,
                MetricRole::Available,
                available,
            ));
        } else {
            self.sink.add_entry(self.scalar(
                entity_type,
                key,
                MetricType::VStorage,
                MetricRole::Used,
                used,
            ));
        }
    }

    /// Capacity and used of a mounted volume
    pub fn gen_volume(&self, entity_type: EntityType, key: &str, capacity: f64, used: f64) {
        self.sink.add_entries([
            self.scalar(
                entity_type,
                key,
                MetricType::StorageAmount,
                MetricRole::Capacity,
                capacity,
            ),
            self.scalar(
                entity_type,
                key,
                MetricType::StorageAmount,
                MetricRole::Used,
                used,
            ),
        ]);
    }

    /// Cumulative throttling counters
    pub fn gen_throttling(
        &self,
        entity_type: EntityType,
        key: &str,
        throttled: f64,
        total: f64,
        timestamp: i64,
    ) {
        self.sink.add_entry(MetricEntry::resource(
            entity_type,
            key,
            MetricType::VCpuThrottling,
            MetricRole::Used,
            MetricValue::Throttling(vec![ThrottlingCumulative {
                throttled,
                total,
                timestamp,
            }]),
        ));
    }

    /// One consumer of the node's pod capacity
    pub fn gen_consumer_count(&self, entity_type: EntityType, key: &str) {
        self.sink.add_entry(self.scalar(
            entity_type,
            key,
            MetricType::NumPods,
            MetricRole::Used,
            1.0,
        ));
    }

    /// Eviction threshold percentage of a commodity
    pub fn gen_threshold(
        &self,
        entity_type: EntityType,
        key: &str,
        metric_type: MetricType,
        percent: f64,
    ) {
        self.sink.add_entry(self.scalar(
            entity_type,
            key,
            metric_type,
            MetricRole::Threshold,
            percent,
        ));
    }

    /// State metric, such as CPU frequency or the cache-used flag
    pub fn gen_state(&self, entity_type: EntityType, key: &str, metric_type: MetricType, value: f64) {
        self.sink
            .add_entry(MetricEntry::state(entity_type, key, metric_type, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricId;

    fn value_of(
        sink: &MetricSink,
        entity_type: EntityType,
        key: &str,
        metric_type: MetricType,
        role: MetricRole,
    ) -> Option<MetricValue> {
        sink.get(&MetricId::new(entity_type, key, metric_type, role))
            .map(|e| e.value)
    }

    #[test]
    fn test_gen_used_shares_timestamp() {
        let sink = MetricSink::new();
        let generator = MetricGenerator::new(sink.clone());
        generator.gen_used(EntityType::Pod, "ns/p", 0.25, 512.0, 42);

        let cpu = value_of(&sink, EntityType::Pod, "ns/p", MetricType::Cpu, MetricRole::Used)
            .unwrap();
        let mem = value_of(&sink, EntityType::Pod, "ns/p", MetricType::Memory, MetricRole::Used)
            .unwrap();
        assert_eq!(cpu.as_points().unwrap()[0], Point { value: 0.25, timestamp: 42 });
        assert_eq!(mem.as_points().unwrap()[0], Point { value: 512.0, timestamp: 42 });
    }

    #[test]
    fn test_gen_filesystem_node_reports_available() {
        let sink = MetricSink::new();
        let generator = MetricGenerator::new(sink.clone());
        generator.gen_filesystem(EntityType::Node, "n1", 100.0, 70.0, 30.0);

        assert_eq!(sink.len(), 2);
        let available = value_of(
            &sink,
            EntityType::Node,
            "n1",
            MetricType::VStorage,
            MetricRole::Available,
        );
        assert_eq!(available, Some(MetricValue::Scalar(30.0)));
        assert!(value_of(&sink, EntityType::Node, "n1", MetricType::VStorage, MetricRole::Used)
            .is_none());
    }

    #[test]
    fn test_gen_filesystem_pod_reports_used() {
        let sink = MetricSink::new();
        let generator = MetricGenerator::new(sink.clone());
        generator.gen_filesystem(EntityType::Pod, "ns/p", 2.0, 1.0, 0.0);

        let used = value_of(&sink, EntityType::Pod, "ns/p", MetricType::VStorage, MetricRole::Used);
        assert_eq!(used, Some(MetricValue::Scalar(1.0)));
        assert!(value_of(
            &sink,
            EntityType::Pod,
            "ns/p",
            MetricType::VStorage,
            MetricRole::Available
        )
        .is_none());
    }

    #[test]
    fn test_gen_volume_and_consumer_count() {
        let sink = MetricSink::new();
        let generator = MetricGenerator::new(sink.clone());
        generator.gen_volume(EntityType::Pod, "ns/p-data", 1024.0, 512.0);
        generator.gen_consumer_count(EntityType::Pod, "ns/p");

        assert_eq!(
            value_of(
                &sink,
                EntityType::Pod,
                "ns/p-data",
                MetricType::StorageAmount,
                MetricRole::Capacity
            ),
            Some(MetricValue::Scalar(1024.0))
        );
        assert_eq!(
            value_of(&sink, EntityType::Pod, "ns/p", MetricType::NumPods, MetricRole::Used),
            Some(MetricValue::Scalar(1.0))
        );
    }

    #[test]
    fn test_gen_throttling() {
        let sink = MetricSink::new();
        let generator = MetricGenerator::new(sink.clone());
        generator.gen_throttling(EntityType::Container, "ns/p/c", 5.0, 10.0, 7);

        let value = value_of(
            &sink,
            EntityType::Container,
            "ns/p/c",
            MetricType::VCpuThrottling,
            MetricRole::Used,
        )
        .unwrap();
        let record = value.as_throttling().unwrap()[0];
        assert_eq!(record.ratio(), Some(0.5));
        assert_eq!(record.timestamp, 7);
    }
}
