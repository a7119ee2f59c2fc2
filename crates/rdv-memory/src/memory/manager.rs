//! Memory Manager
//!
//! High-level interface that wraps the memory store with:
//! - Content-first storage (ids, expiry and importance filled in from config)
//! - Targeted importance and tag updates
//! - Tier consolidation
//! - Event notification and the background cleanup lifecycle

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{MemoryResult, config::MemoryConfig};
use super::{
    CleanupScheduler, ConsolidationPolicy, EventNotifier, ImportancePromotion, MemoryEvent,
    MemoryNode, MemoryStats, MemoryStore, MemoryTier, NodeUpdate, SearchQuery, SearchResult,
    SearchText, StoreOutcome,
};
use super::types::clamp_importance;

/// Options for `MemoryManager::store_content`
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Defaults to `MemoryConfig::default_importance`
    pub importance: Option<f64>,
    pub tags: Vec<String>,
    pub metadata: Option<Map<String, Value>>,
    /// Absolute expiry; wins over `ttl`
    pub expires_at: Option<DateTime<Utc>>,
    /// Time-to-live; defaults to the tier's configured TTL
    pub ttl: Option<chrono::Duration>,
}

/// High-level memory interface
pub struct MemoryManager<C = Value> {
    store: MemoryStore<C>,
    config: MemoryConfig,
    events: EventNotifier,
    scheduler: CleanupScheduler<C>,
}

impl<C> MemoryManager<C>
where
    C: SearchText + Clone + Send + Sync + 'static,
{
    /// Create a manager over a fresh store
    ///
    /// Nothing runs in the background until `initialize` is called.
    pub fn new(config: MemoryConfig) -> MemoryResult<Self> {
        let store = MemoryStore::new(&config)?;
        let events = EventNotifier::default();
        let scheduler = CleanupScheduler::new(
            store.clone(),
            Duration::from_secs(config.cleanup.interval_secs),
        )
        .with_events(events.clone());

        Ok(Self {
            store,
            config,
            events,
            scheduler,
        })
    }

    /// Start background cleanup if the configuration enables it
    pub async fn initialize(&self) {
        if self.config.cleanup.enabled {
            self.scheduler.start().await;
        }
    }

    /// Stop background cleanup
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
    }

    pub async fn is_cleanup_running(&self) -> bool {
        self.scheduler.is_running().await
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The underlying store (shares state with the manager)
    pub fn store(&self) -> &MemoryStore<C> {
        &self.store
    }

    /// Observe store activity
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.events.subscribe()
    }

    /// Store content under a generated id
    pub async fn store_content(
        &self,
        content: C,
        tier: MemoryTier,
        options: StoreOptions,
    ) -> MemoryNode<C> {
        let importance = options.importance.unwrap_or(self.config.default_importance);
        let mut node = MemoryNode::new(Uuid::new_v4().to_string(), content, tier)
            .with_importance(clamp_importance(importance))
            .with_tags(options.tags);

        if let Some(metadata) = options.metadata {
            node.metadata = metadata;
        }

        // A TTL past the end of the calendar means no expiry
        let default_ttl = self.config.ttl.duration(tier);
        node.expires_at = options.expires_at.or_else(|| {
            options
                .ttl
                .or(default_ttl)
                .and_then(|ttl| node.created_at.checked_add_signed(ttl))
        });

        if !self.store_node(node.clone()).await.is_stored() {
            warn!(id = %node.id, "Generated memory id collided with a live node");
        }
        node
    }

    /// Store a caller-built node
    pub async fn store_node(&self, node: MemoryNode<C>) -> StoreOutcome {
        let id = node.id.clone();
        let tier = node.tier;
        let outcome = self.store.store(node).await;

        if let StoreOutcome::Stored { evicted } = &outcome {
            if let Some(evicted) = evicted {
                self.events.emit(MemoryEvent::Evicted {
                    id: evicted.clone(),
                    tier,
                });
            }
            self.events.emit(MemoryEvent::Stored { id, tier });
        }

        outcome
    }

    pub async fn get(&self, id: &str) -> Option<MemoryNode<C>> {
        let node = self.store.get(id).await?;
        self.events.emit(MemoryEvent::Retrieved {
            ids: vec![node.id.clone()],
        });
        Some(node)
    }

    pub async fn search(&self, query: &SearchQuery) -> SearchResult<C> {
        let result = self.store.search(query).await;
        if !result.is_empty() {
            self.events.emit(MemoryEvent::Retrieved {
                ids: result.nodes().map(|n| n.id.clone()).collect(),
            });
        }
        result
    }

    /// Free-text search across all tiers
    pub async fn recall(&self, text: &str, limit: usize) -> SearchResult<C> {
        self.search(&SearchQuery::text(text).limit(limit)).await
    }

    pub async fn update(&self, id: &str, update: NodeUpdate<C>) -> bool {
        let updated = self.store.update(id, update).await;
        if updated {
            self.events.emit(MemoryEvent::Updated { id: id.to_string() });
        }
        updated
    }

    pub async fn update_importance(&self, id: &str, importance: f64) -> bool {
        self.update(id, NodeUpdate::new().importance(importance)).await
    }

    /// Add tags to a live node, keeping its existing ones
    pub async fn add_tags<I, S>(&self, id: &str, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let added: Vec<String> = tags.into_iter().map(Into::into).collect();
        let updated = self
            .store
            .update_with(id, |node| {
                let mut merged = node.tags.clone();
                merged.extend(added);
                NodeUpdate::new().tags(merged)
            })
            .await;
        if updated {
            self.events.emit(MemoryEvent::Updated { id: id.to_string() });
        }
        updated
    }

    /// Remove tags from a live node
    pub async fn remove_tags<I, S>(&self, id: &str, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let removed: Vec<String> = tags.into_iter().map(Into::into).collect();
        let updated = self
            .store
            .update_with(id, |node| {
                let mut kept = node.tags.clone();
                for tag in &removed {
                    kept.remove(tag);
                }
                NodeUpdate::new().tags(kept)
            })
            .await;
        if updated {
            self.events.emit(MemoryEvent::Updated { id: id.to_string() });
        }
        updated
    }

    pub async fn delete(&self, id: &str) -> bool {
        let deleted = self.store.delete(id).await;
        if deleted {
            self.events.emit(MemoryEvent::Deleted { id: id.to_string() });
        }
        deleted
    }

    pub async fn get_by_tier(&self, tier: MemoryTier) -> Vec<MemoryNode<C>> {
        self.store.get_by_tier(tier).await
    }

    pub async fn clear(&self, tier: Option<MemoryTier>) -> usize {
        let removed = self.store.clear(tier).await;
        self.events.emit(MemoryEvent::Cleared { tier, removed });
        removed
    }

    pub async fn get_stats(&self) -> MemoryStats<C> {
        self.store.get_stats().await
    }

    /// Sweep expired nodes now
    pub async fn cleanup(&self) -> usize {
        let removed = self.store.cleanup().await;
        if removed > 0 {
            self.events.emit(MemoryEvent::Cleaned { removed });
        }
        removed
    }

    /// Move nodes between tiers according to `policy`; returns how many moved
    pub async fn consolidate(&self, policy: &dyn ConsolidationPolicy) -> usize {
        let report = self.store.consolidate(policy).await;
        let moved = report.moved_count();

        for evicted in report.evicted {
            self.events.emit(MemoryEvent::Evicted {
                id: evicted.id,
                tier: evicted.tier,
            });
        }
        if moved > 0 {
            info!(policy = policy.name(), moved, "Consolidated memory nodes");
        }
        self.events.emit(MemoryEvent::Consolidated { moved });

        moved
    }

    /// Consolidate with the policy described by `config.consolidation`
    pub async fn consolidate_default(&self) -> usize {
        let policy = ImportancePromotion::from(&self.config.consolidation);
        self.consolidate(&policy).await
    }
}
