//! Retry and backoff decisions
//!
//! Applies the failure taxonomy to an operation that just came back from a
//! handler and persists the resulting transition before anything else sees
//! it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use shiftsync_common::{BackoffPolicy, Clock, ErrorClassification};
use shiftsync_domain::constants::MAX_ERROR_LENGTH;
use shiftsync_domain::{Operation, OperationStatus, Result, SyncEvent};
use tracing::{debug, error, info, warn};

use super::errors::{SubmissionError, SubmissionErrorCategory};
use super::events::EventBus;
use super::ports::OperationStore;
use super::strategies::StrategyRegistry;

/// What happened to a failed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to pending without consuming a retry.
    Deferred,
    /// Pending again, not before `scheduled_for`.
    Rescheduled { retry_count: u32, scheduled_for: DateTime<Utc> },
    /// Terminal.
    Failed { reason: String },
}

/// Applies the failure taxonomy: defer, reschedule with backoff, or fail
pub struct RetryManager {
    store: Arc<dyn OperationStore>,
    events: Arc<EventBus>,
    strategies: Arc<StrategyRegistry>,
    clock: Arc<dyn Clock>,
    max_retry_delay: Duration,
}

impl RetryManager {
    pub fn new(
        store: Arc<dyn OperationStore>,
        events: Arc<EventBus>,
        strategies: Arc<StrategyRegistry>,
        clock: Arc<dyn Clock>,
        max_retry_delay: Duration,
    ) -> Self {
        Self { store, events, strategies, clock, max_retry_delay }
    }

    /// Delay before retry number `retry_count` (1-based)
    pub fn delay_for(&self, operation: &Operation, retry_count: u32) -> Duration {
        let base = self.strategies.strategy_for(&operation.op_type).base_retry_delay;
        let cap = self.retry_cap();
        // Cap wins even when a strategy's base delay exceeds it
        let policy = BackoffPolicy::custom(base.min(cap), cap)
            .unwrap_or_else(|_| BackoffPolicy::new(cap));
        policy.delay_for_retry(retry_count)
    }

    fn retry_cap(&self) -> Duration {
        self.max_retry_delay.max(Duration::from_millis(1))
    }

    /// Route a submission failure
    pub async fn handle_failure(
        &self,
        mut operation: Operation,
        failure: &SubmissionError,
    ) -> Result<FailureOutcome> {
        let reason = truncate_reason(&failure.to_string());
        let now = self.clock.now_utc();

        match failure.category() {
            SubmissionErrorCategory::Connectivity => {
                debug!(operation_id = %operation.id, "connectivity failure, deferring");
                operation.status = OperationStatus::Pending;
                operation.last_error = Some(reason);
                operation.updated_at = now;
                self.store.put(&operation).await?;
                Ok(FailureOutcome::Deferred)
            }
            SubmissionErrorCategory::Permanent => self.fail(operation, &reason).await,
            SubmissionErrorCategory::Transient => {
                if operation.retries_exhausted() {
                    return self.fail(operation, &reason).await;
                }

                operation.retry_count += 1;
                let mut delay = self.delay_for(&operation, operation.retry_count);
                if let Some(retry_after) = failure.retry_after() {
                    delay = delay.max(retry_after).min(self.retry_cap());
                }
                let scheduled_for = now
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(1));

                operation.status = OperationStatus::Pending;
                operation.scheduled_for = Some(scheduled_for);
                operation.last_error = Some(reason.clone());
                operation.updated_at = now;
                self.store.put(&operation).await?;

                info!(
                    operation_id = %operation.id,
                    retry_count = operation.retry_count,
                    max_retries = operation.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "operation rescheduled"
                );
                self.events.emit(SyncEvent::OperationRetrying {
                    operation_id: operation.id.clone(),
                    op_type: operation.op_type.clone(),
                    retry_count: operation.retry_count,
                    scheduled_for,
                    reason,
                });

                Ok(FailureOutcome::Rescheduled { retry_count: operation.retry_count, scheduled_for })
            }
        }
    }

    /// Mark an operation failed and run its fallback once
    pub async fn fail(&self, mut operation: Operation, reason: &str) -> Result<FailureOutcome> {
        let reason = truncate_reason(reason);
        let now = self.clock.now_utc();

        operation.status = OperationStatus::Failed;
        operation.last_error = Some(reason.clone());
        operation.updated_at = now;
        if operation.last_attempt.is_none() {
            operation.last_attempt = Some(now);
        }
        self.store.put(&operation).await?;

        warn!(operation_id = %operation.id, op_type = %operation.op_type, reason = %reason, "operation failed");
        self.events.emit(SyncEvent::OperationFailed {
            operation_id: operation.id.clone(),
            op_type: operation.op_type.clone(),
            reason: reason.clone(),
        });

        self.run_fallback(&operation, &reason).await;
        Ok(FailureOutcome::Failed { reason })
    }

    async fn run_fallback(&self, operation: &Operation, reason: &str) {
        let Some(fallback) = self.strategies.fallback_for(&operation.op_type) else {
            return;
        };

        match AssertUnwindSafe(fallback.on_failed(operation, reason)).catch_unwind().await {
            Ok(Ok(())) => debug!(operation_id = %operation.id, "fallback action ran"),
            Ok(Err(err)) => {
                warn!(operation_id = %operation.id, error = %err, "fallback action failed");
            }
            Err(_) => error!(operation_id = %operation.id, "fallback action panicked"),
        }
    }
}

pub(crate) fn truncate_reason(reason: &str) -> String {
    if reason.chars().count() <= MAX_ERROR_LENGTH {
        return reason.to_string();
    }
    reason.chars().take(MAX_ERROR_LENGTH).collect()
}
