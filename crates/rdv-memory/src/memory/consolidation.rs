//! Memory consolidation policies.
//!
//! A policy looks at each live node and decides whether it belongs in another
//! tier. The store carries out the moves as delete + store, since a node's
//! tier never changes in place.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::config::ConsolidationConfig;
use super::types::MemoryTier;

/// Content-free view of a node handed to policies
#[derive(Debug, Clone, Copy)]
pub struct NodeProfile<'a> {
    pub id: &'a str,
    pub tier: MemoryTier,
    pub importance: f64,
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
    pub tags: &'a BTreeSet<String>,
}

/// Decides which nodes move between tiers
pub trait ConsolidationPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Tier the node should move to, or `None` to leave it in place
    fn target(&self, node: &NodeProfile<'_>) -> Option<MemoryTier>;
}

/// Promote nodes at or above an importance threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ImportancePromotion {
    pub from: MemoryTier,
    pub to: MemoryTier,
    pub min_importance: f64,
}

impl Default for ImportancePromotion {
    fn default() -> Self {
        Self::from(&ConsolidationConfig::default())
    }
}

impl From<&ConsolidationConfig> for ImportancePromotion {
    fn from(config: &ConsolidationConfig) -> Self {
        Self {
            from: config.from,
            to: config.to,
            min_importance: config.min_importance,
        }
    }
}

impl ConsolidationPolicy for ImportancePromotion {
    fn name(&self) -> &str {
        "importance_promotion"
    }

    fn target(&self, node: &NodeProfile<'_>) -> Option<MemoryTier> {
        (node.tier == self.from && node.importance >= self.min_importance).then_some(self.to)
    }
}

/// Promote nodes that have been read often
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPromotion {
    pub from: MemoryTier,
    pub to: MemoryTier,
    pub min_access: u64,
}

impl Default for AccessPromotion {
    fn default() -> Self {
        Self {
            from: MemoryTier::ShortTerm,
            to: MemoryTier::LongTerm,
            min_access: 3,
        }
    }
}

impl ConsolidationPolicy for AccessPromotion {
    fn name(&self) -> &str {
        "access_promotion"
    }

    fn target(&self, node: &NodeProfile<'_>) -> Option<MemoryTier> {
        (node.tier == self.from && node.access_count >= self.min_access).then_some(self.to)
    }
}

/// A single node moved by consolidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierMove {
    pub id: String,
    pub from: MemoryTier,
    pub to: MemoryTier,
}

/// A node evicted from a full target tier to admit a moved node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub id: String,
    pub tier: MemoryTier,
}

/// Result of a consolidation pass
#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    pub moved: Vec<TierMove>,
    pub evicted: Vec<Eviction>,
}

impl ConsolidationReport {
    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }
}
