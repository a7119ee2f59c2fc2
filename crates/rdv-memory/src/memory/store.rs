//! Memory Store Implementation
//!
//! In-process, tier-aware node container. One `RwLock` guards the whole node
//! set and every operation that can touch a node (reads bump `access_count`
//! and reclaim expired nodes) holds the write half for its full duration,
//! so each call is atomic with respect to the others and to the background
//! sweep.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::MemoryResult;
use crate::config::{MemoryConfig, TierCapacities};
use super::consolidation::{
    ConsolidationPolicy, ConsolidationReport, Eviction, NodeProfile, TierMove,
};
use super::scoring::{self, RelevanceWeights, Signals};
use super::types::*;

struct Slot<C> {
    node: MemoryNode<C>,
    /// Insertion order; breaks `created_at` ties for eviction and ranking
    seq: u64,
}

struct StoreState<C> {
    nodes: HashMap<String, Slot<C>>,
    next_seq: u64,
}

impl<C> StoreState<C> {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn insert(&mut self, node: MemoryNode<C>, seq: u64) {
        self.nodes.insert(node.id.clone(), Slot { node, seq });
    }

    fn tier_len(&self, tier: MemoryTier) -> usize {
        self.nodes.values().filter(|s| s.node.tier == tier).count()
    }

    /// Look up a live node, deleting it instead if it has expired
    fn live_mut(&mut self, id: &str, now: DateTime<Utc>) -> Option<&mut Slot<C>> {
        if self.nodes.get(id)?.node.is_expired_at(now) {
            self.nodes.remove(id);
            debug!(id = %id, "Reclaimed expired memory node on read");
            return None;
        }
        self.nodes.get_mut(id)
    }

    /// Delete expired nodes, optionally limited to one tier
    fn purge_expired(&mut self, tier: Option<MemoryTier>, now: DateTime<Utc>) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|_, s| {
            let in_scope = tier.is_none_or(|t| s.node.tier == t);
            !(in_scope && s.node.is_expired_at(now))
        });
        before - self.nodes.len()
    }

    /// Free one slot in `tier` if it is at capacity
    ///
    /// Expired nodes in the tier go first; only if that frees nothing is the
    /// oldest live node evicted.
    fn make_room(
        &mut self,
        tier: MemoryTier,
        capacity: Option<usize>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let capacity = capacity?;
        if self.tier_len(tier) < capacity {
            return None;
        }

        let reclaimed = self.purge_expired(Some(tier), now);
        if reclaimed > 0 {
            debug!(tier = %tier, reclaimed, "Reclaimed expired nodes before admitting");
        }
        if self.tier_len(tier) < capacity {
            return None;
        }

        let oldest = self.oldest_in(tier)?.to_string();
        self.nodes.remove(&oldest);
        debug!(id = %oldest, tier = %tier, capacity, "Evicted oldest memory node");
        Some(oldest)
    }

    /// Id of the node `make_room` would evict from `tier`
    fn oldest_in(&self, tier: MemoryTier) -> Option<&str> {
        self.nodes
            .values()
            .filter(|s| s.node.tier == tier)
            .min_by_key(|s| (s.node.created_at, s.seq))
            .map(|s| s.node.id.as_str())
    }

    fn is_full(&self, tier: MemoryTier, capacity: Option<usize>) -> bool {
        capacity.is_some_and(|capacity| self.tier_len(tier) >= capacity)
    }

    /// Live nodes ordered newest first
    fn newest_first(&self) -> Vec<&Slot<C>> {
        let mut slots: Vec<&Slot<C>> = self.nodes.values().collect();
        slots.sort_by(|a, b| {
            (b.node.created_at, b.seq).cmp(&(a.node.created_at, a.seq))
        });
        slots
    }
}

/// Tier-aware in-process memory store
///
/// Cheap to clone; clones share the same node set.
pub struct MemoryStore<C = Value> {
    state: Arc<RwLock<StoreState<C>>>,
    capacities: TierCapacities,
    weights: RelevanceWeights,
    default_limit: Option<usize>,
    top_n: usize,
}

impl<C> Clone for MemoryStore<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            capacities: self.capacities,
            weights: self.weights,
            default_limit: self.default_limit,
            top_n: self.top_n,
        }
    }
}

impl<C> MemoryStore<C>
where
    C: SearchText + Clone,
{
    /// Create an empty store
    ///
    /// Fails only if `config` does not validate.
    pub fn new(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;

        Ok(Self {
            state: Arc::new(RwLock::new(StoreState {
                nodes: HashMap::new(),
                next_seq: 0,
            })),
            capacities: config.capacity,
            weights: config.search.weights,
            default_limit: config.search.default_limit,
            top_n: config.stats.top_n,
        })
    }

    /// Store a new node
    ///
    /// The node's `access_count` starts over at 0 and its importance is clamped
    /// into [0, 1]. If the tier is full, the oldest node in it is evicted first.
    /// An id held by a live node is rejected; one held by an expired node is
    /// reclaimed and reused.
    pub async fn store(&self, mut node: MemoryNode<C>) -> StoreOutcome {
        let now = Utc::now();
        node.access_count = 0;
        node.importance = clamp_importance(node.importance);

        let mut state = self.state.write().await;

        if state.live_mut(&node.id, now).is_some() {
            warn!(id = %node.id, "Rejected memory node with duplicate id");
            return StoreOutcome::DuplicateId;
        }

        let evicted = state.make_room(node.tier, self.capacities.get(node.tier), now);
        let seq = state.next_seq();
        debug!(id = %node.id, tier = %node.tier, "Stored memory node");
        state.insert(node, seq);

        StoreOutcome::Stored { evicted }
    }

    /// Get a node by id, bumping its access count
    pub async fn get(&self, id: &str) -> Option<MemoryNode<C>> {
        let mut state = self.state.write().await;
        let slot = state.live_mut(id, Utc::now())?;
        slot.node.access_count += 1;
        Some(slot.node.clone())
    }

    /// Filter, rank and truncate live nodes
    ///
    /// Every returned node has its access count bumped; matches cut off by
    /// the limit are left untouched.
    pub async fn search(&self, query: &SearchQuery) -> SearchResult<C> {
        let started = Instant::now();
        let now = Utc::now();
        let needle = query.text.as_ref().map(|t| t.to_lowercase());

        let mut state = self.state.write().await;

        let reclaimed = state.purge_expired(None, now);
        if reclaimed > 0 {
            debug!(reclaimed, "Reclaimed expired memory nodes during search");
        }

        let candidates: Vec<(String, Signals)> = state
            .nodes
            .values()
            .filter(|s| matches_query(&s.node, query, needle.as_deref()))
            .map(|s| {
                (
                    s.node.id.clone(),
                    Signals {
                        importance: s.node.importance,
                        created_at: s.node.created_at,
                        access_count: s.node.access_count,
                        seq: s.seq,
                    },
                )
            })
            .collect();

        let total = candidates.len();
        let signals: Vec<Signals> = candidates.iter().map(|(_, s)| *s).collect();
        let limit = query.limit.or(self.default_limit).unwrap_or(usize::MAX);

        let hits = scoring::rank(&signals, &self.weights)
            .into_iter()
            .take(limit)
            .filter_map(|(index, score)| {
                let slot = state.nodes.get_mut(&candidates[index].0)?;
                slot.node.access_count += 1;
                Some(SearchHit {
                    node: slot.node.clone(),
                    score,
                })
            })
            .collect();

        SearchResult {
            hits,
            total,
            took: started.elapsed(),
        }
    }

    /// Apply a partial update to a live node
    ///
    /// Refreshes `created_at`, so an updated node counts as the newest in its
    /// tier. Returns false for unknown or expired ids.
    pub async fn update(&self, id: &str, update: NodeUpdate<C>) -> bool {
        self.update_with(id, |_| update).await
    }

    /// Like `update`, but builds the update from the node's current state
    /// while the lock is held
    pub async fn update_with<F>(&self, id: &str, build: F) -> bool
    where
        F: FnOnce(&MemoryNode<C>) -> NodeUpdate<C>,
    {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let seq = state.next_seq();

        let Some(slot) = state.live_mut(id, now) else {
            return false;
        };

        let NodeUpdate {
            content,
            importance,
            tags,
            metadata,
            expires_at,
        } = build(&slot.node);

        if let Some(content) = content {
            slot.node.content = content;
        }
        if let Some(importance) = importance {
            slot.node.importance = clamp_importance(importance);
        }
        if let Some(tags) = tags {
            slot.node.tags = tags;
        }
        if let Some(metadata) = metadata {
            slot.node.metadata = metadata;
        }
        if let Some(expires_at) = expires_at {
            slot.node.expires_at = expires_at;
        }
        slot.node.created_at = now;
        slot.seq = seq;

        true
    }

    /// Remove a node; true if one was resident
    pub async fn delete(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        state.nodes.remove(id).is_some()
    }

    /// All live nodes in `tier`, newest first
    pub async fn get_by_tier(&self, tier: MemoryTier) -> Vec<MemoryNode<C>> {
        let mut state = self.state.write().await;
        state.purge_expired(Some(tier), Utc::now());

        state
            .newest_first()
            .into_iter()
            .filter(|s| s.node.tier == tier)
            .map(|s| s.node.clone())
            .collect()
    }

    /// Remove every node in `tier`, or every node when `tier` is `None`
    pub async fn clear(&self, tier: Option<MemoryTier>) -> usize {
        let mut state = self.state.write().await;
        let before = state.nodes.len();
        match tier {
            Some(tier) => state.nodes.retain(|_, s| s.node.tier != tier),
            None => state.nodes.clear(),
        }
        before - state.nodes.len()
    }

    /// Aggregate statistics over live nodes
    pub async fn get_stats(&self) -> MemoryStats<C> {
        let mut state = self.state.write().await;
        state.purge_expired(None, Utc::now());

        let mut count_by_tier: HashMap<MemoryTier, usize> = HashMap::new();
        let mut importance_sum: HashMap<MemoryTier, f64> = HashMap::new();
        for slot in state.nodes.values() {
            *count_by_tier.entry(slot.node.tier).or_default() += 1;
            *importance_sum.entry(slot.node.tier).or_default() += slot.node.importance;
        }

        let avg_importance_by_tier = MemoryTier::ALL
            .into_iter()
            .map(|tier| {
                let count = count_by_tier.get(&tier).copied().unwrap_or(0);
                let avg = if count == 0 {
                    0.0
                } else {
                    importance_sum.get(&tier).copied().unwrap_or(0.0) / count as f64
                };
                (tier, avg)
            })
            .collect();

        for tier in MemoryTier::ALL {
            count_by_tier.entry(tier).or_default();
        }

        let newest = state.newest_first();
        let most_recent = newest
            .iter()
            .take(self.top_n)
            .map(|s| s.node.clone())
            .collect();

        // Stable sort keeps newest-first order among equal counts
        let mut by_access = newest;
        by_access.sort_by(|a, b| b.node.access_count.cmp(&a.node.access_count));
        let most_accessed = by_access
            .into_iter()
            .take(self.top_n)
            .map(|s| s.node.clone())
            .collect();

        MemoryStats {
            total: state.nodes.len(),
            count_by_tier,
            avg_importance_by_tier,
            most_accessed,
            most_recent,
        }
    }

    /// Delete every expired node; returns how many were removed
    pub async fn cleanup(&self) -> usize {
        let mut state = self.state.write().await;
        let removed = state.purge_expired(None, Utc::now());
        if removed > 0 {
            debug!(removed, "Swept expired memory nodes");
        }
        removed
    }

    /// Move nodes between tiers as `policy` directs
    ///
    /// Runs under a single lock acquisition. Each move is a delete followed by
    /// a store into the target tier that keeps `created_at` and
    /// `access_count`; the target tier's capacity applies as for `store`.
    /// A move that would evict a node moved earlier in the same pass is
    /// skipped, so the node stays in its current tier.
    pub async fn consolidate(&self, policy: &dyn ConsolidationPolicy) -> ConsolidationReport {
        let now = Utc::now();
        let mut state = self.state.write().await;
        state.purge_expired(None, now);

        let planned: Vec<(String, MemoryTier, MemoryTier)> = state
            .newest_first()
            .into_iter()
            .rev()
            .filter_map(|s| {
                let profile = NodeProfile {
                    id: &s.node.id,
                    tier: s.node.tier,
                    importance: s.node.importance,
                    access_count: s.node.access_count,
                    created_at: s.node.created_at,
                    tags: &s.node.tags,
                };
                policy
                    .target(&profile)
                    .filter(|to| *to != s.node.tier)
                    .map(|to| (s.node.id.clone(), s.node.tier, to))
            })
            .collect();

        let mut report = ConsolidationReport::default();
        let mut arrived: HashSet<String> = HashSet::new();
        for (id, from, to) in planned {
            // Never evict a node this pass has already moved
            let capacity = self.capacities.get(to);
            if state.is_full(to, capacity)
                && state.oldest_in(to).is_some_and(|oldest| arrived.contains(oldest))
            {
                debug!(id = %id, tier = %to, "Target tier full; node left in place");
                continue;
            }

            let Some(Slot { mut node, seq }) = state.nodes.remove(&id) else {
                continue;
            };
            if let Some(evicted) = state.make_room(to, capacity, now) {
                report.evicted.push(Eviction { id: evicted, tier: to });
            }
            node.tier = to;
            state.insert(node, seq);
            arrived.insert(id.clone());
            report.moved.push(TierMove { id, from, to });
        }

        report
    }

    /// Number of live nodes
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        let now = Utc::now();
        state
            .nodes
            .values()
            .filter(|s| !s.node.is_expired_at(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether a live node with `id` exists; does not count as an access
    pub async fn contains(&self, id: &str) -> bool {
        let state = self.state.read().await;
        state
            .nodes
            .get(id)
            .is_some_and(|s| !s.node.is_expired_at(Utc::now()))
    }
}

fn matches_query<C: SearchText>(
    node: &MemoryNode<C>,
    query: &SearchQuery,
    needle: Option<&str>,
) -> bool {
    if query.tier.is_some_and(|tier| node.tier != tier) {
        return false;
    }
    if !query.tags.is_empty() && !node.has_any_tag(&query.tags) {
        return false;
    }
    if query.min_importance.is_some_and(|min| node.importance < min) {
        return false;
    }
    if query.created_after.is_some_and(|after| node.created_at < after) {
        return false;
    }
    if query.created_before.is_some_and(|before| node.created_at > before) {
        return false;
    }
    match needle {
        Some(needle) => node.content.search_text().to_lowercase().contains(needle),
        None => true,
    }
}
