//! Lifecycle events published by the sync engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::{OperationType, Priority};

/// Why a sync cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncTrigger {
    NetworkOnline,
    AppForeground,
    Explicit,
    Timer,
    Wake,
    Startup,
}

crate::impl_domain_status_conversions!(SyncTrigger {
    NetworkOnline => "network-online",
    AppForeground => "app-foreground",
    Explicit => "explicit",
    Timer => "timer",
    Wake => "wake",
    Startup => "startup",
});

/// Tally of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Operations handed to a handler.
    pub dispatched: usize,
    pub completed: usize,
    /// Rescheduled with backoff.
    pub retried: usize,
    pub failed: usize,
    /// Returned to pending without consuming a retry (connectivity).
    pub deferred: usize,
    /// Scheduled for a later time.
    pub not_due: usize,
    /// Waiting on dependencies.
    pub blocked: usize,
    /// Network-bound work skipped while offline.
    pub offline: usize,
    /// Over the per-type batch cap, left for the next cycle.
    pub over_batch_cap: usize,
    /// Terminal rows removed by retention cleanup.
    pub purged: usize,
}

impl CycleReport {
    pub fn merge(&mut self, other: &CycleReport) {
        self.dispatched += other.dispatched;
        self.completed += other.completed;
        self.retried += other.retried;
        self.failed += other.failed;
        self.deferred += other.deferred;
        self.not_due += other.not_due;
        self.blocked += other.blocked;
        self.offline += other.offline;
        self.over_batch_cap += other.over_batch_cap;
        self.purged += other.purged;
    }
}

/// Event published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SyncEvent {
    #[serde(rename_all = "camelCase")]
    OperationQueued { operation_id: String, op_type: OperationType, priority: Priority },
    #[serde(rename_all = "camelCase")]
    OperationProcessing { operation_id: String, op_type: OperationType },
    #[serde(rename_all = "camelCase")]
    OperationCompleted {
        operation_id: String,
        op_type: OperationType,
        confirmation_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    OperationRetrying {
        operation_id: String,
        op_type: OperationType,
        retry_count: u32,
        scheduled_for: DateTime<Utc>,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    OperationFailed { operation_id: String, op_type: OperationType, reason: String },
    #[serde(rename_all = "camelCase")]
    SyncStarted { cycle_id: String, trigger: SyncTrigger },
    #[serde(rename_all = "camelCase")]
    SyncCompleted { cycle_id: String, report: CycleReport },
    #[serde(rename_all = "camelCase")]
    SyncFailed { cycle_id: String, error: String },
    /// Secondary event raised by a handler after a successful submission,
    /// e.g. `form-submitted`.
    #[serde(rename_all = "camelCase")]
    Domain {
        name: String,
        operation_id: String,
        op_type: OperationType,
        confirmation_id: Option<String>,
    },
}

impl SyncEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &str {
        match self {
            Self::OperationQueued { .. } => "operation-queued",
            Self::OperationProcessing { .. } => "operation-processing",
            Self::OperationCompleted { .. } => "operation-completed",
            Self::OperationRetrying { .. } => "operation-retrying",
            Self::OperationFailed { .. } => "operation-failed",
            Self::SyncStarted { .. } => "sync-started",
            Self::SyncCompleted { .. } => "sync-completed",
            Self::SyncFailed { .. } => "sync-failed",
            Self::Domain { name, .. } => name,
        }
    }

    /// Operation the event is about, if any.
    pub fn operation_id(&self) -> Option<&str> {
        match self {
            Self::OperationQueued { operation_id, .. }
            | Self::OperationProcessing { operation_id, .. }
            | Self::OperationCompleted { operation_id, .. }
            | Self::OperationRetrying { operation_id, .. }
            | Self::OperationFailed { operation_id, .. }
            | Self::Domain { operation_id, .. } => Some(operation_id),
            Self::SyncStarted { .. } | Self::SyncCompleted { .. } | Self::SyncFailed { .. } => {
                None
            }
        }
    }
}
