use std::time::Duration;

use serde::{Deserialize, Serialize};

const DAY_SECS: u64 = 24 * 60 * 60;

/// Capacity and lifetime of a [`FeatureCache`](crate::FeatureCache).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries held before a prune pass runs.
    pub max_size: usize,
    /// Entries evicted by one prune pass.
    pub items_to_prune: usize,
    /// Lifetime of cached entries in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::with_max_size(200_000)
    }
}

impl CacheConfig {
    /// Capacity of `max_size`, pruning one percent per pass, one day TTL.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            max_size,
            items_to_prune: (max_size / 100).max(1),
            ttl_secs: DAY_SECS,
        }
    }

    /// Same settings with `items_to_prune` raised to at least one, so a full
    /// cache always evicts.
    pub fn normalized(self) -> Self {
        Self {
            items_to_prune: self.items_to_prune.max(1),
            ..self
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
