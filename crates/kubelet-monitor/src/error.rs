//! Error types for the kubelet monitor

use thiserror::Error;

/// Errors produced while running a discovery cycle
///
/// Only [`MonitorError::EmptyNodeList`] ever escapes a cycle. The other
/// variants describe per-node failures that are logged and absorbed at the
/// scrape task boundary.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The caller handed over no nodes to scrape
    #[error("invalid or empty node list, finishing immediately")]
    EmptyNodeList,

    /// The node carries no address the node agent can be reached on
    #[error("node {node} has no address usable for monitoring")]
    NoMonitorAddress { node: String },

    /// A stats-client call failed for one node
    #[error("failed to get {resource} from node {node}: {source}")]
    Fetch {
        node: String,
        resource: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration could not be loaded
    #[error("invalid monitor configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl MonitorError {
    pub(crate) fn fetch(node: &str, resource: &'static str, source: anyhow::Error) -> Self {
        Self::Fetch {
            node: node.to_string(),
            resource,
            source,
        }
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
