//! Stats client abstraction
//!
//! Transport to the node agent lives outside this crate. The monitor only
//! depends on this trait, which the transport layer implements.

use super::stats::{CounterFamily, Node, Summary, Threshold};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Source of raw node statistics
///
/// Every request receives the cycle's stop token. Implementations may
/// abandon in-flight work when it fires; the monitor does not rely on it.
#[async_trait]
pub trait StatsClient: Send + Sync {
    /// CPU frequency of the node in MHz
    async fn cpu_frequency(&self, node: &Node, cancel: &CancellationToken) -> Result<f64>;

    /// Node and pod statistics
    async fn summary(
        &self,
        address: &str,
        node_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Summary>;

    /// Eviction thresholds configured on the node agent
    async fn thresholds(
        &self,
        address: &str,
        node_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Threshold>>;

    /// Raw counter families keyed by family name
    async fn throttling_counters(
        &self,
        address: &str,
        node_name: &str,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, CounterFamily>>;

    /// Whether the last response for this address was served from cache
    fn has_cache_been_used(&self, address: &str) -> bool;
}
