//! Monitor configuration

use crate::error::Result;
use serde::Deserialize;

/// Optional behaviour that can be switched off per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FeatureGates {
    /// Collect mounted volume statistics during full discovery
    #[serde(default = "enabled")]
    pub persistent_volumes: bool,

    /// Fetch and correlate CPU throttling counters
    #[serde(default = "enabled")]
    pub throttling_metrics: bool,
}

fn enabled() -> bool {
    true
}

impl Default for FeatureGates {
    fn default() -> Self {
        Self {
            persistent_volumes: true,
            throttling_metrics: true,
        }
    }
}

/// Configuration handed to the monitor at construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MonitorConfig {
    /// Upper bound on nodes scraped at the same time; unset or 0 scrapes
    /// every node at once
    #[serde(default)]
    pub max_concurrent_scrapes: Option<usize>,

    #[serde(default)]
    pub features: FeatureGates,
}

impl MonitorConfig {
    /// Load configuration from `KUBELET_MONITOR_*` environment variables
    ///
    /// Nested keys use a double underscore, e.g.
    /// `KUBELET_MONITOR_FEATURES__PERSISTENT_VOLUMES=false`.
    pub fn load() -> Result<Self> {
        Self::from_source(
            config::Environment::with_prefix("KUBELET_MONITOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder().add_source(source).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Effective concurrency bound, if any
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.max_concurrent_scrapes.filter(|n| *n > 0)
    }

    pub fn with_features(mut self, features: FeatureGates) -> Self {
        self.features = features;
        self
    }

    pub fn with_max_concurrent_scrapes(mut self, limit: usize) -> Self {
        self.max_concurrent_scrapes = Some(limit);
        self
    }
}
