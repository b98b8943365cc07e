//! Retention cleanup for terminal operations

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shiftsync_domain::Result;
use tracing::{debug, info, instrument};

use super::ports::OperationStore;

/// Statistics from one cleanup pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupStats {
    pub purged: usize,
    pub cutoff: DateTime<Utc>,
}

/// Deletes terminal operations older than the retention window
pub struct RetentionCleaner {
    store: Arc<dyn OperationStore>,
    retention: Duration,
}

impl RetentionCleaner {
    pub fn new(store: Arc<dyn OperationStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Delete completed/failed rows whose last activity is older than the
    /// retention window
    #[instrument(skip(self))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let cutoff = now - self.retention;
        let purged = self.store.purge_terminal_before(cutoff).await?;

        if purged > 0 {
            info!(purged, %cutoff, "purged terminal operations");
        } else {
            debug!(%cutoff, "nothing to purge");
        }

        Ok(CleanupStats { purged, cutoff })
    }
}
