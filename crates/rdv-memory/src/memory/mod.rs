//! Hierarchical Memory Store
//!
//! Keeps nodes in four independent tiers:
//! - Short-term: recent, usually short-lived observations (TTL by default)
//! - Long-term: durable facts promoted out of short-term
//! - Episodic: records of specific events
//! - Semantic: general knowledge
//!
//! # Architecture
//!
//! - `MemoryStore` owns the nodes and enforces per-tier capacity, expiry and
//!   relevance-ranked search
//! - `MemoryManager` wraps a store with id generation, tier defaults,
//!   consolidation and event notification
//! - `CleanupScheduler` sweeps expired nodes in the background so idle tiers
//!   give back their capacity

mod types;
mod store;
mod scoring;
mod consolidation;
mod events;
mod scheduler;
mod manager;

// Re-export public types
pub use types::{
    MemoryNode, MemoryStats, MemoryTier, NodeUpdate, SearchHit, SearchQuery, SearchResult,
    SearchText, StoreOutcome,
};

pub use store::MemoryStore;
pub use scoring::{RelevanceWeights, Signals, rank};
pub use consolidation::{
    AccessPromotion, ConsolidationPolicy, ConsolidationReport, Eviction, ImportancePromotion,
    NodeProfile, TierMove,
};
pub use events::{EVENT_CHANNEL_CAPACITY, EventNotifier, MemoryEvent};
pub use scheduler::{CleanupScheduler, MIN_SWEEP_INTERVAL};
pub use manager::{MemoryManager, StoreOptions};
