//! Type handlers
//!
//! A handler receives operations that are already claimed (`processing`),
//! calls the submission boundary under a timeout and reports one result per
//! operation. It never touches the store; settling results is the engine's
//! job.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use shiftsync_domain::{HandlingMode, Operation, OperationType};
use tracing::{debug, warn};

use super::errors::SubmissionError;
use super::merge::merge_operations;
use super::ports::{
    ItemOutcome, SubmissionItem, SubmissionReceipt, SubmissionRequest, Submitter,
};

/// Outcome for one operation; `Ok` carries the confirmation id, if any
#[derive(Debug, Clone)]
pub struct OperationResult {
    pub operation: Operation,
    pub result: Result<Option<String>, SubmissionError>,
}

impl OperationResult {
    fn accepted(operation: Operation, confirmation_id: Option<String>) -> Self {
        Self { operation, result: Ok(confirmation_id) }
    }

    fn rejected(operation: Operation, error: SubmissionError) -> Self {
        Self { operation, result: Err(error) }
    }
}

#[async_trait]
pub trait TypeHandler: Send + Sync {
    fn mode(&self) -> HandlingMode;

    async fn handle(
        &self,
        op_type: &OperationType,
        operations: Vec<Operation>,
        submitter: &dyn Submitter,
        timeout: Duration,
    ) -> Vec<OperationResult>;
}

/// Submit under a timeout; elapsed time counts as a transient failure
async fn submit_with_timeout(
    submitter: &dyn Submitter,
    request: SubmissionRequest,
    timeout: Duration,
) -> Result<SubmissionReceipt, SubmissionError> {
    match tokio::time::timeout(timeout, submitter.submit(request)).await {
        Ok(result) => result,
        Err(_) => Err(SubmissionError::Timeout(timeout)),
    }
}

/// One call per operation, in the order given
#[derive(Debug, Default)]
pub struct IndividualHandler;

#[async_trait]
impl TypeHandler for IndividualHandler {
    fn mode(&self) -> HandlingMode {
        HandlingMode::Individual
    }

    async fn handle(
        &self,
        _op_type: &OperationType,
        operations: Vec<Operation>,
        submitter: &dyn Submitter,
        timeout: Duration,
    ) -> Vec<OperationResult> {
        let mut results = Vec::with_capacity(operations.len());
        for operation in operations {
            let request = SubmissionRequest::Single(SubmissionItem::from(&operation));
            let result = submit_with_timeout(submitter, request, timeout)
                .await
                .map(|receipt| receipt.confirmation_id);
            results.push(OperationResult { operation, result });
        }
        results
    }
}

/// One call for the whole group
#[derive(Debug, Default)]
pub struct BatchedHandler;

#[async_trait]
impl TypeHandler for BatchedHandler {
    fn mode(&self) -> HandlingMode {
        HandlingMode::Batched
    }

    async fn handle(
        &self,
        op_type: &OperationType,
        operations: Vec<Operation>,
        submitter: &dyn Submitter,
        timeout: Duration,
    ) -> Vec<OperationResult> {
        let request = SubmissionRequest::Batch {
            op_type: op_type.clone(),
            items: operations.iter().map(SubmissionItem::from).collect(),
        };
        debug!(%op_type, count = operations.len(), "submitting batch");

        match submit_with_timeout(submitter, request, timeout).await {
            Ok(receipt) => route_batch_receipt(operations, receipt),
            Err(err) => {
                warn!(%op_type, count = operations.len(), error = %err, "batch submission failed");
                operations.into_iter().map(|op| OperationResult::rejected(op, err.clone())).collect()
            }
        }
    }
}

/// Per-item results route individually; unlisted items count as accepted
fn route_batch_receipt(
    operations: Vec<Operation>,
    receipt: SubmissionReceipt,
) -> Vec<OperationResult> {
    let mut outcomes: HashMap<String, ItemOutcome> = receipt
        .item_results
        .unwrap_or_default()
        .into_iter()
        .map(|item| (item.operation_id, item.outcome))
        .collect();

    operations
        .into_iter()
        .map(|operation| match outcomes.remove(&operation.id) {
            Some(ItemOutcome::Accepted { confirmation_id }) => {
                let confirmation_id = confirmation_id.or_else(|| receipt.confirmation_id.clone());
                OperationResult::accepted(operation, confirmation_id)
            }
            Some(ItemOutcome::Rejected(err)) => OperationResult::rejected(operation, err),
            None => OperationResult::accepted(operation, receipt.confirmation_id.clone()),
        })
        .collect()
}

/// Fold same-entity operations into one record per entity, then submit each
#[derive(Debug, Default)]
pub struct MergeHandler;

#[async_trait]
impl TypeHandler for MergeHandler {
    fn mode(&self) -> HandlingMode {
        HandlingMode::Merge
    }

    async fn handle(
        &self,
        op_type: &OperationType,
        operations: Vec<Operation>,
        submitter: &dyn Submitter,
        timeout: Duration,
    ) -> Vec<OperationResult> {
        let merged = merge_operations(&operations);
        debug!(%op_type, operations = operations.len(), records = merged.len(), "merged operations");

        let mut by_id: HashMap<String, Operation> =
            operations.into_iter().map(|op| (op.id.clone(), op)).collect();
        let mut results = Vec::with_capacity(by_id.len());

        for record in merged {
            let request = SubmissionRequest::Merged {
                op_type: op_type.clone(),
                record: record.record,
                source_ids: record.source_ids.clone(),
                owner: record.owner,
            };
            let result = submit_with_timeout(submitter, request, timeout)
                .await
                .map(|receipt| receipt.confirmation_id);

            for id in record.source_ids {
                if let Some(operation) = by_id.remove(&id) {
                    results.push(OperationResult { operation, result: result.clone() });
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parking_lot::Mutex;
    use serde_json::json;
    use shiftsync_domain::{OperationStatus, OwnerContext, Priority};

    use super::*;
    use crate::sync::ports::ItemResult;

    struct Recorder {
        calls: Mutex<Vec<SubmissionRequest>>,
        response: Result<SubmissionReceipt, SubmissionError>,
    }

    impl Recorder {
        fn new(response: Result<SubmissionReceipt, SubmissionError>) -> Self {
            Self { calls: Mutex::new(Vec::new()), response }
        }
    }

    #[async_trait]
    impl Submitter for Recorder {
        async fn submit(
            &self,
            request: SubmissionRequest,
        ) -> Result<SubmissionReceipt, SubmissionError> {
            self.calls.lock().push(request);
            self.response.clone()
        }
    }

    struct Slow;

    #[async_trait]
    impl Submitter for Slow {
        async fn submit(
            &self,
            _request: SubmissionRequest,
        ) -> Result<SubmissionReceipt, SubmissionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SubmissionReceipt::default())
        }
    }

    fn op(id: &str, op_type: OperationType) -> Operation {
        let now = Utc::now();
        Operation {
            id: id.into(),
            op_type,
            priority: Priority::Medium,
            payload: json!({"moduleId": "m1", "progress": 10}),
            created_at: now,
            updated_at: now,
            scheduled_for: None,
            retry_count: 0,
            max_retries: 3,
            last_attempt: Some(now),
            status: OperationStatus::Processing,
            network_required: true,
            dependencies: Vec::new(),
            owner: OwnerContext::default(),
            last_error: None,
        }
    }

    #[tokio::test]
    async fn individual_calls_once_per_operation() {
        let submitter = Recorder::new(Ok(SubmissionReceipt::confirmed("c1")));
        let ops = vec![op("a", OperationType::FormSubmission), op("b", OperationType::FormSubmission)];

        let results = IndividualHandler
            .handle(&OperationType::FormSubmission, ops, &submitter, Duration::from_secs(1))
            .await;

        assert_eq!(submitter.calls.lock().len(), 2);
        assert!(results.iter().all(|r| r.result == Ok(Some("c1".into()))));
    }

    #[tokio::test]
    async fn batch_failure_routes_every_item() {
        let submitter =
            Recorder::new(Err(SubmissionError::Server { status: 503, message: "down".into() }));
        let ops = vec![op("a", OperationType::SopAccess), op("b", OperationType::SopAccess)];

        let results = BatchedHandler
            .handle(&OperationType::SopAccess, ops, &submitter, Duration::from_secs(1))
            .await;

        assert_eq!(submitter.calls.lock().len(), 1);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.result.is_err()));
    }

    #[tokio::test]
    async fn batch_item_results_route_only_failures() {
        let receipt = SubmissionReceipt {
            confirmation_id: Some("batch-1".into()),
            item_results: Some(vec![ItemResult {
                operation_id: "b".into(),
                outcome: ItemOutcome::Rejected(SubmissionError::Invalid("bad".into())),
            }]),
        };
        let submitter = Recorder::new(Ok(receipt));
        let ops = vec![op("a", OperationType::AuditLog), op("b", OperationType::AuditLog)];

        let results = BatchedHandler
            .handle(&OperationType::AuditLog, ops, &submitter, Duration::from_secs(1))
            .await;

        assert_eq!(results[0].result, Ok(Some("batch-1".into())));
        assert!(matches!(results[1].result, Err(SubmissionError::Invalid(_))));
    }

    #[tokio::test]
    async fn merge_submits_one_record_for_same_module() {
        let submitter = Recorder::new(Ok(SubmissionReceipt::default()));
        let ops = vec![
            op("a", OperationType::TrainingProgress),
            op("b", OperationType::TrainingProgress),
        ];

        let results = MergeHandler
            .handle(&OperationType::TrainingProgress, ops, &submitter, Duration::from_secs(1))
            .await;

        let calls = submitter.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation_ids().len(), 2);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_submission_times_out_as_transient() {
        let results = IndividualHandler
            .handle(
                &OperationType::ShiftAction,
                vec![op("a", OperationType::ShiftAction)],
                &Slow,
                Duration::from_secs(5),
            )
            .await;

        let err = results[0].result.clone().unwrap_err();
        assert_eq!(err, SubmissionError::Timeout(Duration::from_secs(5)));
        assert!(err.consumes_retry());
    }
}
