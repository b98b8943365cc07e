//! Producer options and status snapshots

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::{OwnerContext, Priority};

/// Overrides accepted by `enqueue`. Unset fields fall back to the type's
/// strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueOptions {
    pub priority: Option<Priority>,
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub immediate: Option<bool>,
    pub max_retries: Option<u32>,
    pub network_required: Option<bool>,
    #[serde(default)]
    pub owner: OwnerContext,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn depends_on(mut self, operation_id: impl Into<String>) -> Self {
        self.dependencies.push(operation_id.into());
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = Some(immediate);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn network_required(mut self, required: bool) -> Self {
        self.network_required = Some(required);
        self
    }

    pub fn owner(mut self, owner: OwnerContext) -> Self {
        self.owner = owner;
        self
    }
}

/// Row counts by status as reported by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// Snapshot for status surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub counts: StatusCounts,
    /// Pending operations per type tag.
    pub pending_by_type: BTreeMap<String, usize>,
    pub online: bool,
    pub syncing: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
}
