//! In-process event bus
//!
//! Two ways to observe the engine:
//! - registered listeners, invoked synchronously in registration order
//! - a bounded broadcast channel for async consumers
//!
//! A listener that returns an error or panics is logged and skipped; it never
//! affects the engine or the other listeners.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use shiftsync_domain::constants::DEFAULT_EVENT_CAPACITY;
use shiftsync_domain::SyncEvent;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

/// Synchronous event callback
pub type Listener = Arc<dyn Fn(&SyncEvent) -> Result<(), String> + Send + Sync>;

/// Handle returned by [`EventBus::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered in-process listeners plus a broadcast channel for subscribers
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Bus whose broadcast channel buffers `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, listeners: RwLock::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// Publish an event to every listener and subscriber
    pub fn emit(&self, event: SyncEvent) {
        debug!(event = event.name(), operation_id = ?event.operation_id(), "emitting sync event");

        // Snapshot so listeners may register or remove listeners themselves
        let listeners: Vec<(ListenerId, Listener)> = self.listeners.read().clone();
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(listener = id.0, event = event.name(), error = %err, "event listener failed");
                }
                Err(_) => {
                    error!(listener = id.0, event = event.name(), "event listener panicked");
                }
            }
        }

        // No receivers is not an error
        let _ = self.sender.send(event);
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SyncEvent) -> Result<(), String> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns whether the listener was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
