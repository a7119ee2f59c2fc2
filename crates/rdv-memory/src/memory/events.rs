//! Memory Events
//!
//! Notification points for external observers. Events go out on a tokio
//! broadcast channel: publishing never blocks, events are dropped when nobody
//! is subscribed, and a subscriber that falls behind loses the oldest ones.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::MemoryTier;

/// Capacity of the event channel per subscriber
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something that happened to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MemoryEvent {
    Stored { id: String, tier: MemoryTier },
    Evicted { id: String, tier: MemoryTier },
    Retrieved { ids: Vec<String> },
    Updated { id: String },
    Deleted { id: String },
    Cleared { tier: Option<MemoryTier>, removed: usize },
    Consolidated { moved: usize },
    Cleaned { removed: usize },
}

/// Publishing half of the event channel
#[derive(Debug, Clone)]
pub struct EventNotifier {
    tx: broadcast::Sender<MemoryEvent>,
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl EventNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a new observer; it sees events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.tx.subscribe()
    }

    /// Publish without blocking; a missing audience is not an error
    pub fn emit(&self, event: MemoryEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
