//! In-memory operation store
//!
//! Same contract as the SQLite store minus durability. Used by tests and by
//! hosts that only need a process-lifetime queue.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shiftsync_domain::{Operation, OperationStatus, OperationType, Result, StatusCounts};

use super::ports::OperationStore;

/// [`OperationStore`] kept in a locked map
#[derive(Debug, Default)]
pub struct InMemoryOperationStore {
    rows: RwLock<HashMap<String, Operation>>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn collect_sorted(&self, keep: impl Fn(&Operation) -> bool) -> Vec<Operation> {
        let mut found: Vec<Operation> =
            self.rows.read().values().filter(|op| keep(op)).cloned().collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        found
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn put(&self, operation: &Operation) -> Result<()> {
        self.rows.write().insert(operation.id.clone(), operation.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Operation>> {
        Ok(self.rows.read().get(id).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Operation>> {
        let rows = self.rows.read();
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn query_by_status(&self, status: OperationStatus) -> Result<Vec<Operation>> {
        Ok(self.collect_sorted(|op| op.status == status))
    }

    async fn query_by_type(&self, op_type: &OperationType) -> Result<Vec<Operation>> {
        Ok(self.collect_sorted(|op| &op.op_type == op_type))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.rows.write().remove(id).is_some())
    }

    async fn claim(&self, ids: &[String], now: DateTime<Utc>) -> Result<Vec<Operation>> {
        let mut rows = self.rows.write();
        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(op) = rows.get_mut(id) {
                if op.status == OperationStatus::Pending {
                    op.status = OperationStatus::Processing;
                    op.last_attempt = Some(now);
                    op.updated_at = now;
                    claimed.push(op.clone());
                }
            }
        }
        Ok(claimed)
    }

    async fn recover_interrupted(&self) -> Result<usize> {
        let mut rows = self.rows.write();
        let mut recovered = 0;
        for op in rows.values_mut().filter(|op| op.status == OperationStatus::Processing) {
            op.status = OperationStatus::Pending;
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn status_counts(&self) -> Result<StatusCounts> {
        let mut counts = StatusCounts::default();
        for op in self.rows.read().values() {
            match op.status {
                OperationStatus::Pending => counts.pending += 1,
                OperationStatus::Processing => counts.processing += 1,
                OperationStatus::Completed => counts.completed += 1,
                OperationStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|_, op| !(op.status.is_terminal() && op.retention_anchor() < cutoff));
        Ok(before - rows.len())
    }

    async fn reset_failed(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut rows = self.rows.write();
        let mut reset = 0;
        for op in rows.values_mut().filter(|op| op.status == OperationStatus::Failed) {
            op.status = OperationStatus::Pending;
            op.retry_count = 0;
            op.scheduled_for = None;
            op.updated_at = now;
            reset += 1;
        }
        Ok(reset)
    }

    async fn reset_for_retry(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Operation>> {
        let mut rows = self.rows.write();
        let Some(op) = rows.get_mut(id) else {
            return Ok(None);
        };
        match op.status {
            OperationStatus::Failed => op.retry_count = 0,
            OperationStatus::Pending => {}
            OperationStatus::Processing | OperationStatus::Completed => return Ok(None),
        }
        op.status = OperationStatus::Pending;
        op.scheduled_for = None;
        op.updated_at = now;
        Ok(Some(op.clone()))
    }
}
