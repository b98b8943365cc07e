//! Network state monitor
//!
//! Tracks connectivity and foreground state. It only raises triggers; the
//! engine (or the background worker) decides what to run.

use std::sync::atomic::{AtomicBool, Ordering};

use shiftsync_domain::SyncTrigger;
use tokio::sync::broadcast;
use tracing::{debug, info};

const TRIGGER_CAPACITY: usize = 64;

/// Online and foreground flags; transitions raise sync triggers
#[derive(Debug)]
pub struct NetworkMonitor {
    online: AtomicBool,
    foreground: AtomicBool,
    triggers: broadcast::Sender<SyncTrigger>,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (triggers, _) = broadcast::channel(TRIGGER_CAPACITY);
        Self {
            online: AtomicBool::new(initially_online),
            foreground: AtomicBool::new(true),
            triggers,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    /// Record connectivity. Returns true when this call raised a
    /// `network-online` trigger.
    pub fn set_online(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return false;
        }

        info!(online, "connectivity changed");
        if online {
            self.raise(SyncTrigger::NetworkOnline);
            return true;
        }
        false
    }

    /// Record foreground state. Coming to the foreground while online raises
    /// an `app-foreground` trigger.
    pub fn set_foreground(&self, foreground: bool) -> bool {
        let was_foreground = self.foreground.swap(foreground, Ordering::SeqCst);
        if was_foreground == foreground {
            return false;
        }

        debug!(foreground, "foreground state changed");
        if foreground && self.is_online() {
            self.raise(SyncTrigger::AppForeground);
            return true;
        }
        false
    }

    /// Ask for a cycle without a state change
    pub fn request_sync(&self, trigger: SyncTrigger) {
        self.raise(trigger);
    }

    /// Triggers raised by state transitions and explicit requests
    pub fn subscribe(&self) -> broadcast::Receiver<SyncTrigger> {
        self.triggers.subscribe()
    }

    fn raise(&self, trigger: SyncTrigger) {
        debug!(%trigger, "raising sync trigger");
        let _ = self.triggers.send(trigger);
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
