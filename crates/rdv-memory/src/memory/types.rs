//! Memory Type Definitions
//!
//! Defines the core types for the hierarchical memory store.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Memory tier (short-term, long-term, episodic, semantic)
///
/// Each tier is an independent capacity domain. A node stays in the tier it
/// was stored in; moving it means deleting and storing it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    ShortTerm,
    LongTerm,
    Episodic,
    Semantic,
}

impl MemoryTier {
    /// Every tier, in declaration order
    pub const ALL: [MemoryTier; 4] = [
        MemoryTier::ShortTerm,
        MemoryTier::LongTerm,
        MemoryTier::Episodic,
        MemoryTier::Semantic,
    ];

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::LongTerm => "long_term",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_term" => Ok(Self::ShortTerm),
            "long_term" => Ok(Self::LongTerm),
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            _ => Err(format!("Invalid memory tier: {}", s)),
        }
    }
}

/// Text the store matches free-text queries against.
///
/// The store never looks inside a payload except through this trait.
pub trait SearchText {
    fn search_text(&self) -> Cow<'_, str>;
}

impl SearchText for String {
    fn search_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl SearchText for Value {
    /// JSON strings are searched as their raw text, anything else as compact JSON.
    fn search_text(&self) -> Cow<'_, str> {
        match self {
            Value::String(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }
}

/// A single stored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode<C = Value> {
    pub id: String,
    pub content: C,
    pub tier: MemoryTier,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    /// In [0, 1]
    pub importance: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl<C> MemoryNode<C> {
    /// Create a node created now, with neutral importance and no expiry
    pub fn new(id: impl Into<String>, content: C, tier: MemoryTier) -> Self {
        Self {
            id: id.into(),
            content,
            tier,
            created_at: Utc::now(),
            access_count: 0,
            importance: 0.5,
            tags: BTreeSet::new(),
            metadata: Map::new(),
            expires_at: None,
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Expire `ttl` after the node's creation time
    ///
    /// A TTL that overflows the calendar leaves the node without expiry.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_at = self.created_at.checked_add_signed(ttl);
        self
    }

    /// Whether the node is logically dead at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether the node is logically dead right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// True if the node carries at least one of `tags`
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Clamp importance into [0, 1]; NaN becomes 0
pub(crate) fn clamp_importance(importance: f64) -> f64 {
    if importance.is_nan() {
        0.0
    } else {
        importance.clamp(0.0, 1.0)
    }
}

/// Partial update applied by `MemoryStore::update`.
///
/// There is deliberately no `id` or `tier` field: neither can change after
/// a node is stored.
#[derive(Debug, Clone)]
pub struct NodeUpdate<C = Value> {
    pub content: Option<C>,
    pub importance: Option<f64>,
    pub tags: Option<BTreeSet<String>>,
    pub metadata: Option<Map<String, Value>>,
    /// `Some(None)` clears the expiry
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl<C> Default for NodeUpdate<C> {
    fn default() -> Self {
        Self {
            content: None,
            importance: None,
            tags: None,
            metadata: None,
            expires_at: None,
        }
    }
}

impl<C> NodeUpdate<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: C) -> Self {
        self.content = Some(content);
        self
    }

    pub fn importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(Some(expires_at));
        self
    }

    pub fn clear_expiry(mut self) -> Self {
        self.expires_at = Some(None);
        self
    }

    /// True if applying this update would change nothing but the timestamp
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.importance.is_none()
            && self.tags.is_none()
            && self.metadata.is_none()
            && self.expires_at.is_none()
    }
}

/// Query for `MemoryStore::search`
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Case-insensitive substring matched against the node's search text
    pub text: Option<String>,
    pub tier: Option<MemoryTier>,
    /// Node must carry at least one of these (ignored when empty)
    pub tags: Vec<String>,
    pub min_importance: Option<f64>,
    /// Inclusive lower bound on `created_at`
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    /// Query matching `text` anywhere in the node's search text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn in_tier(mut self, tier: MemoryTier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_importance(mut self, min_importance: f64) -> Self {
        self.min_importance = Some(min_importance);
        self
    }

    pub fn created_between(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_after = after;
        self.created_before = before;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A ranked search match
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit<C = Value> {
    pub node: MemoryNode<C>,
    pub score: f64,
}

/// Ranked, truncated search output
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult<C = Value> {
    pub hits: Vec<SearchHit<C>>,
    /// Number of matches before truncation
    pub total: usize,
    pub took: std::time::Duration,
}

impl<C> SearchResult<C> {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode<C>> {
        self.hits.iter().map(|h| &h.node)
    }

    pub fn into_nodes(self) -> Vec<MemoryNode<C>> {
        self.hits.into_iter().map(|h| h.node).collect()
    }
}

/// Result of `MemoryStore::store`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Node admitted; `evicted` names the node removed to make room, if any
    Stored { evicted: Option<String> },
    /// A live node with the same id already exists; nothing changed
    DuplicateId,
}

impl StoreOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }

    pub fn evicted(&self) -> Option<&str> {
        match self {
            Self::Stored { evicted } => evicted.as_deref(),
            Self::DuplicateId => None,
        }
    }
}

/// Memory statistics (live nodes only)
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats<C = Value> {
    pub total: usize,
    /// Always contains all four tiers
    pub count_by_tier: HashMap<MemoryTier, usize>,
    /// Always contains all four tiers; 0 for an empty tier
    pub avg_importance_by_tier: HashMap<MemoryTier, f64>,
    pub most_accessed: Vec<MemoryNode<C>>,
    pub most_recent: Vec<MemoryNode<C>>,
}

impl<C> MemoryStats<C> {
    pub fn count(&self, tier: MemoryTier) -> usize {
        self.count_by_tier.get(&tier).copied().unwrap_or(0)
    }

    pub fn avg_importance(&self, tier: MemoryTier) -> f64 {
        self.avg_importance_by_tier.get(&tier).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tier_conversion() {
        assert_eq!("short_term".parse::<MemoryTier>(), Ok(MemoryTier::ShortTerm));
        assert_eq!("semantic".parse::<MemoryTier>(), Ok(MemoryTier::Semantic));
        assert!("working".parse::<MemoryTier>().is_err());
        assert_eq!(MemoryTier::Episodic.as_str(), "episodic");
        assert_eq!(MemoryTier::LongTerm.to_string(), "long_term");
    }

    #[test]
    fn test_tier_serde_names() {
        let json = serde_json::to_string(&MemoryTier::ShortTerm).unwrap();
        assert_eq!(json, "\"short_term\"");
    }

    #[test]
    fn test_search_text_for_json() {
        assert_eq!(json!("Alpha beta").search_text(), "Alpha beta");
        let structured = json!({"note": "alpha"});
        assert!(structured.search_text().contains("alpha"));
        assert!(structured.search_text().contains("note"));
    }

    #[test]
    fn test_node_expiry() {
        let now = Utc::now();
        let node = MemoryNode::new("a", json!("x"), MemoryTier::ShortTerm)
            .with_expires_at(now - Duration::seconds(1));
        assert!(node.is_expired_at(now));

        let node = MemoryNode::new("b", json!("x"), MemoryTier::ShortTerm)
            .with_ttl(Duration::minutes(5));
        assert!(!node.is_expired());

        let node = MemoryNode::new("c", json!("x"), MemoryTier::Semantic);
        assert!(!node.is_expired_at(now + Duration::days(365)));
    }

    #[test]
    fn test_overflowing_ttl_means_no_expiry() {
        let node = MemoryNode::new("a", json!("x"), MemoryTier::LongTerm)
            .with_ttl(Duration::days(365 * 1_000_000));
        assert_eq!(node.expires_at, None);
        assert!(!node.is_expired());
    }

    #[test]
    fn test_node_tags() {
        let node = MemoryNode::new("a", json!("x"), MemoryTier::Episodic)
            .with_tags(["git", "shell"])
            .with_tag("git");
        assert_eq!(node.tags.len(), 2);
        assert!(node.has_any_tag(&["shell".to_string(), "npm".to_string()]));
        assert!(!node.has_any_tag(&["npm".to_string()]));
        assert!(!node.has_any_tag(&[]));
    }

    #[test]
    fn test_node_update_builder() {
        let update: NodeUpdate = NodeUpdate::new();
        assert!(update.is_empty());

        let update: NodeUpdate = NodeUpdate::new().importance(0.9).clear_expiry();
        assert!(!update.is_empty());
        assert_eq!(update.importance, Some(0.9));
        assert_eq!(update.expires_at, Some(None));
    }

    #[test]
    fn test_clamp_importance() {
        assert_eq!(clamp_importance(-0.5), 0.0);
        assert_eq!(clamp_importance(0.3), 0.3);
        assert_eq!(clamp_importance(7.0), 1.0);
        assert_eq!(clamp_importance(f64::NAN), 0.0);
    }

    #[test]
    fn test_store_outcome() {
        let outcome = StoreOutcome::Stored { evicted: Some("old".into()) };
        assert!(outcome.is_stored());
        assert_eq!(outcome.evicted(), Some("old"));
        assert!(!StoreOutcome::DuplicateId.is_stored());
    }
}
