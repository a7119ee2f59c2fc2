//! Background expiry sweep
//!
//! Periodically runs `MemoryStore::cleanup` so idle tiers still give back
//! capacity held by expired nodes. Each scheduler owns its task; there is no
//! process-wide timer, so independent stores never interfere.

use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::events::{EventNotifier, MemoryEvent};
use super::store::MemoryStore;
use super::types::SearchText;

/// Shortest interval a scheduler will sweep at
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Handle for a running sweep task
struct SweepHandle {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owned, stoppable background cleanup timer
pub struct CleanupScheduler<C> {
    store: MemoryStore<C>,
    interval: Duration,
    events: Option<EventNotifier>,
    running: Mutex<Option<SweepHandle>>,
}

impl<C> CleanupScheduler<C>
where
    C: SearchText + Clone + Send + Sync + 'static,
{
    /// Create a stopped scheduler sweeping `store` every `interval`
    ///
    /// Intervals below `MIN_SWEEP_INTERVAL` are raised to it.
    pub fn new(store: MemoryStore<C>, interval: Duration) -> Self {
        if interval < MIN_SWEEP_INTERVAL {
            warn!(
                interval_ms = interval.as_millis() as u64,
                "Cleanup interval too short; using the minimum"
            );
        }

        Self {
            store,
            interval: interval.max(MIN_SWEEP_INTERVAL),
            events: None,
            running: Mutex::new(None),
        }
    }

    /// Publish a `Cleaned` event whenever a sweep removes something
    pub fn with_events(mut self, events: EventNotifier) -> Self {
        self.events = Some(events);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start sweeping; returns false if already running
    ///
    /// The first sweep happens one interval after starting.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let store = self.store.clone();
        let events = self.events.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let removed = store.cleanup().await;
                        debug!(removed, "Background memory sweep finished");
                        if removed > 0 {
                            if let Some(events) = &events {
                                events.emit(MemoryEvent::Cleaned { removed });
                            }
                        }
                    }
                }
            }
        });

        info!(interval_ms = period.as_millis() as u64, "Started background memory cleanup");
        *running = Some(SweepHandle {
            shutdown_tx,
            handle,
        });
        true
    }

    /// Stop sweeping; returns false if it was not running
    ///
    /// Waits for the task to exit, so no sweep runs after this returns.
    pub async fn stop(&self) -> bool {
        let Some(SweepHandle {
            shutdown_tx,
            handle,
        }) = self.running.lock().await.take()
        else {
            return false;
        };

        let _ = shutdown_tx.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "Background memory cleanup task ended abnormally");
        }
        info!("Stopped background memory cleanup");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

impl<C> Drop for CleanupScheduler<C> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.handle.abort();
        }
    }
}
