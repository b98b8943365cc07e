//! Port interfaces for sync operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shiftsync_domain::{
    Operation, OperationStatus, OperationType, OwnerContext, Result, StatusCounts,
};

use super::errors::SubmissionError;

/// Durable, indexed persistence for queued operations
///
/// Every method must be committed before it returns; the engine relies on
/// that to guarantee an operation is never lost between transitions.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Insert or replace an operation
    async fn put(&self, operation: &Operation) -> Result<()>;

    /// Fetch one operation by id
    async fn get(&self, id: &str) -> Result<Option<Operation>>;

    /// Fetch several operations; unknown ids are skipped
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Operation>>;

    /// All operations in the given status, oldest first
    async fn query_by_status(&self, status: OperationStatus) -> Result<Vec<Operation>>;

    /// All operations of the given type, oldest first
    async fn query_by_type(&self, op_type: &OperationType) -> Result<Vec<Operation>>;

    /// Delete an operation; returns whether a row was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Atomically move the listed operations from `pending` to `processing`
    ///
    /// Returns only the rows this call transitioned, with `last_attempt` set
    /// to `now`. Rows already claimed by someone else are left out.
    async fn claim(&self, ids: &[String], now: DateTime<Utc>) -> Result<Vec<Operation>>;

    /// Reset `processing` rows to `pending` after an interrupted run
    async fn recover_interrupted(&self) -> Result<usize>;

    /// Row counts per status
    async fn status_counts(&self) -> Result<StatusCounts>;

    /// Delete completed/failed rows whose retention anchor is before `cutoff`
    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Move every failed row back to pending with a fresh retry budget
    async fn reset_failed(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Atomically make one `pending` or `failed` operation due now
    ///
    /// Clears `scheduled_for`; a failed row also gets a fresh retry budget.
    /// Returns `None` when the row is missing, `processing` or `completed`,
    /// leaving it untouched.
    async fn reset_for_retry(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Operation>>;
}

/// One operation as sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionItem {
    pub operation_id: String,
    pub op_type: OperationType,
    pub payload: serde_json::Value,
    pub owner: OwnerContext,
    pub created_at: DateTime<Utc>,
}

impl From<&Operation> for SubmissionItem {
    fn from(operation: &Operation) -> Self {
        Self {
            operation_id: operation.id.clone(),
            op_type: operation.op_type.clone(),
            payload: operation.payload.clone(),
            owner: operation.owner.clone(),
            created_at: operation.created_at,
        }
    }
}

/// Shape of a call to the submission boundary
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionRequest {
    /// Individual handling
    Single(SubmissionItem),
    /// Batched handling; one call for the whole group
    Batch { op_type: OperationType, items: Vec<SubmissionItem> },
    /// Merge handling; `record` replaces every source operation
    Merged {
        op_type: OperationType,
        record: serde_json::Value,
        source_ids: Vec<String>,
        owner: OwnerContext,
    },
}

impl SubmissionRequest {
    pub fn op_type(&self) -> &OperationType {
        match self {
            Self::Single(item) => &item.op_type,
            Self::Batch { op_type, .. } | Self::Merged { op_type, .. } => op_type,
        }
    }

    /// Operation ids covered by this request
    pub fn operation_ids(&self) -> Vec<String> {
        match self {
            Self::Single(item) => vec![item.operation_id.clone()],
            Self::Batch { items, .. } => items.iter().map(|i| i.operation_id.clone()).collect(),
            Self::Merged { source_ids, .. } => source_ids.clone(),
        }
    }

    /// Idempotency key the server can use to drop redelivered requests
    pub fn idempotency_key(&self) -> String {
        self.operation_ids().join(",")
    }
}

/// Per-item outcome inside a batch response
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Accepted { confirmation_id: Option<String> },
    Rejected(SubmissionError),
}

/// Result for one operation in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub operation_id: String,
    pub outcome: ItemOutcome,
}

/// Successful response from the submission boundary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionReceipt {
    pub confirmation_id: Option<String>,
    /// Present when a batch endpoint reports items individually. Items not
    /// listed are treated as accepted.
    pub item_results: Option<Vec<ItemResult>>,
}

impl SubmissionReceipt {
    pub fn confirmed(confirmation_id: impl Into<String>) -> Self {
        Self { confirmation_id: Some(confirmation_id.into()), item_results: None }
    }
}

/// External boundary that delivers operations to the server
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(
        &self,
        request: SubmissionRequest,
    ) -> std::result::Result<SubmissionReceipt, SubmissionError>;
}

/// Host integration that can wake the process when connectivity returns
#[async_trait]
pub trait WakeTrigger: Send + Sync {
    /// Ask to be woken; `pending` is the number of network-bound operations
    /// waiting.
    async fn register(&self, pending: usize) -> Result<()>;

    /// Withdraw a previous registration
    async fn cancel(&self) -> Result<()>;
}

/// Optional compensating action run once when an operation fails for good
#[async_trait]
pub trait FallbackAction: Send + Sync {
    async fn on_failed(&self, operation: &Operation, reason: &str) -> Result<()>;
}
