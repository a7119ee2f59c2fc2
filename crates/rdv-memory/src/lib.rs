//! rdv-memory - Hierarchical In-Process Memory Store
//!
//! Tier-aware storage for agent memory with bounded capacity, expiry and
//! relevance-ranked retrieval.
//!
//! # Modules
//!
//! - **memory** - Store, manager, consolidation policies and background cleanup
//! - **config** - TOML/env configuration with validation
//!
//! # Example
//!
//! ```rust,no_run
//! use rdv_memory::{MemoryConfig, MemoryManager, MemoryTier, StoreOptions};
//! use serde_json::json;
//!
//! async fn example() -> rdv_memory::MemoryResult<()> {
//!     let memory: MemoryManager = MemoryManager::new(MemoryConfig::default())?;
//!     memory.initialize().await;
//!
//!     // Short-term nodes expire after the tier's default TTL
//!     memory
//!         .store_content(
//!             json!("User ran `git status`"),
//!             MemoryTier::ShortTerm,
//!             StoreOptions::default(),
//!         )
//!         .await;
//!
//!     // Retrieve relevant context
//!     let context = memory.recall("git", 5).await;
//!     for node in context.nodes() {
//!         println!("{} ({})", node.id, node.tier);
//!     }
//!
//!     memory.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod memory;
mod error;

pub use config::MemoryConfig;
pub use error::{MemoryError, MemoryResult};
pub use memory::{
    CleanupScheduler, ConsolidationPolicy, MemoryEvent, MemoryManager, MemoryNode, MemoryStats,
    MemoryStore, MemoryTier, NodeUpdate, SearchQuery, SearchResult, StoreOptions, StoreOutcome,
};
