//! Integration tests for the SQLCipher-backed operation store
//!
//! Runs every store method against a real encrypted database in a temp dir.

#[path = "support.rs"]
mod support;

use serde_json::json;
use shiftsync_core::OperationStore;
use shiftsync_domain::{OperationStatus, OperationType, OwnerContext, Priority};
use support::{operation, ts, TestDatabase};

/// Validates a full operation survives a write/read cycle.
///
/// Assertions:
/// - Confirms every field, including owner and dependencies, is restored
#[tokio::test]
async fn put_then_get_restores_every_field() {
    let db = TestDatabase::new();
    let mut op = operation("form_submission_1_a", OperationType::FormSubmission, ts(1_000));
    op.priority = Priority::High;
    op.payload = json!({ "formId": "temp-log", "values": { "walkIn": 3.5 } });
    op.scheduled_for = Some(ts(5_000));
    op.retry_count = 2;
    op.last_attempt = Some(ts(4_000));
    op.dependencies = vec!["shift_action_0_z".to_string()];
    op.owner = OwnerContext {
        device_id: Some("tablet-3".into()),
        user_id: Some("u-7".into()),
        restaurant_id: Some("r-1".into()),
    };
    op.last_error = Some("Server error (503): busy".into());

    db.store.put(&op).await.unwrap();
    let loaded = db.store.get(&op.id).await.unwrap().expect("row exists");

    assert_eq!(loaded, op);
}

/// Validates custom operation types keep their tag.
///
/// Assertions:
/// - Confirms a non-built-in type reads back as the same custom tag
#[tokio::test]
async fn custom_types_round_trip_their_tag() {
    let db = TestDatabase::new();
    let op = operation("inventory_count_1_a", OperationType::from("inventory_count"), ts(1));

    db.store.put(&op).await.unwrap();
    let by_type = db.store.query_by_type(&OperationType::from("inventory_count")).await.unwrap();

    assert_eq!(by_type.len(), 1);
    assert!(by_type[0].op_type.is_custom());
}

/// Validates status queries return oldest first.
///
/// Assertions:
/// - Confirms ordering by `created_at`
/// - Confirms rows in other statuses are excluded
#[tokio::test]
async fn query_by_status_is_oldest_first() {
    let db = TestDatabase::new();
    for (id, at) in [("c", 3_000), ("a", 1_000), ("b", 2_000)] {
        db.store.put(&operation(id, OperationType::AuditLog, ts(at))).await.unwrap();
    }
    let mut done = operation("d", OperationType::AuditLog, ts(500));
    done.status = OperationStatus::Completed;
    db.store.put(&done).await.unwrap();

    let pending = db.store.query_by_status(OperationStatus::Pending).await.unwrap();
    let ids: Vec<_> = pending.iter().map(|op| op.id.as_str()).collect();

    assert_eq!(ids, ["a", "b", "c"]);
}

/// Validates claims are exclusive.
///
/// Assertions:
/// - Confirms only pending rows transition to processing
/// - Confirms a second claim of the same ids returns nothing
/// - Confirms `last_attempt` is stamped
#[tokio::test]
async fn claim_transitions_pending_rows_once() {
    let db = TestDatabase::new();
    db.store.put(&operation("a", OperationType::AuditLog, ts(1))).await.unwrap();
    let mut failed = operation("b", OperationType::AuditLog, ts(2));
    failed.status = OperationStatus::Failed;
    db.store.put(&failed).await.unwrap();

    let ids = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
    let claimed = db.store.claim(&ids, ts(10_000)).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, "a");
    assert_eq!(claimed[0].status, OperationStatus::Processing);
    assert_eq!(claimed[0].last_attempt, Some(ts(10_000)));

    assert!(db.store.claim(&ids, ts(11_000)).await.unwrap().is_empty());
}

/// Validates start-up recovery and status counts.
///
/// Assertions:
/// - Confirms processing rows return to pending
/// - Confirms counts reflect the recovered state
#[tokio::test]
async fn recover_interrupted_resets_processing_rows() {
    let db = TestDatabase::new();
    for id in ["a", "b"] {
        db.store.put(&operation(id, OperationType::SopAccess, ts(1))).await.unwrap();
    }
    db.store.claim(&["a".to_string(), "b".to_string()], ts(2)).await.unwrap();
    assert_eq!(db.store.status_counts().await.unwrap().processing, 2);

    let recovered = db.store.recover_interrupted().await.unwrap();
    let counts = db.store.status_counts().await.unwrap();

    assert_eq!(recovered, 2);
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.processing, 0);
}

/// Validates retention purges only old terminal rows.
///
/// Assertions:
/// - Confirms completed/failed rows anchored before the cutoff are deleted
/// - Confirms pending rows and recent terminal rows survive
#[tokio::test]
async fn purge_removes_only_old_terminal_rows() {
    let db = TestDatabase::new();
    let mut old_done = operation("old_done", OperationType::AuditLog, ts(1_000));
    old_done.status = OperationStatus::Completed;
    old_done.last_attempt = Some(ts(2_000));
    let mut old_failed = operation("old_failed", OperationType::AuditLog, ts(1_000));
    old_failed.status = OperationStatus::Failed;
    let mut recent_done = operation("recent_done", OperationType::AuditLog, ts(1_000));
    recent_done.status = OperationStatus::Completed;
    recent_done.last_attempt = Some(ts(9_000));
    let old_pending = operation("old_pending", OperationType::AuditLog, ts(1_000));

    for op in [&old_done, &old_failed, &recent_done, &old_pending] {
        db.store.put(op).await.unwrap();
    }

    let purged = db.store.purge_terminal_before(ts(5_000)).await.unwrap();

    assert_eq!(purged, 2);
    assert!(db.store.get("old_done").await.unwrap().is_none());
    assert!(db.store.get("old_failed").await.unwrap().is_none());
    assert!(db.store.get("recent_done").await.unwrap().is_some());
    assert!(db.store.get("old_pending").await.unwrap().is_some());
}

/// Validates manual retry of failed rows.
///
/// Assertions:
/// - Confirms failed rows become pending with a fresh retry budget
#[tokio::test]
async fn reset_failed_restores_budget() {
    let db = TestDatabase::new();
    let mut failed = operation("a", OperationType::FormSubmission, ts(1));
    failed.status = OperationStatus::Failed;
    failed.retry_count = 3;
    failed.scheduled_for = Some(ts(50));
    db.store.put(&failed).await.unwrap();

    assert_eq!(db.store.reset_failed(ts(100)).await.unwrap(), 1);
    let op = db.store.get("a").await.unwrap().unwrap();

    assert_eq!(op.status, OperationStatus::Pending);
    assert_eq!(op.retry_count, 0);
    assert_eq!(op.scheduled_for, None);
    assert_eq!(op.updated_at, ts(100));
}

/// Validates the single-row retry reset is conditional.
///
/// Assertions:
/// - Confirms a failed row is made due with a fresh budget
/// - Confirms a pending row keeps its retry count but loses its backoff
/// - Confirms a claimed row is left `processing`
#[tokio::test]
async fn reset_for_retry_skips_claimed_rows() {
    let db = TestDatabase::new();
    let mut failed = operation("failed", OperationType::FormSubmission, ts(1));
    failed.status = OperationStatus::Failed;
    failed.retry_count = 3;
    db.store.put(&failed).await.unwrap();
    let mut backed_off = operation("backed-off", OperationType::AuditLog, ts(2));
    backed_off.retry_count = 1;
    backed_off.scheduled_for = Some(ts(60_000));
    db.store.put(&backed_off).await.unwrap();
    db.store.put(&operation("claimed", OperationType::AuditLog, ts(3))).await.unwrap();
    db.store.claim(&["claimed".to_string()], ts(10)).await.unwrap();

    let reset = db.store.reset_for_retry("failed", ts(100)).await.unwrap().unwrap();
    assert_eq!(reset.status, OperationStatus::Pending);
    assert_eq!(reset.retry_count, 0);
    assert_eq!(reset.updated_at, ts(100));

    let reset = db.store.reset_for_retry("backed-off", ts(100)).await.unwrap().unwrap();
    assert_eq!(reset.retry_count, 1);
    assert_eq!(reset.scheduled_for, None);

    assert!(db.store.reset_for_retry("claimed", ts(100)).await.unwrap().is_none());
    assert!(db.store.reset_for_retry("missing", ts(100)).await.unwrap().is_none());
    let claimed = db.store.get("claimed").await.unwrap().unwrap();
    assert_eq!(claimed.status, OperationStatus::Processing);
    assert_eq!(claimed.updated_at, ts(10));
}

/// Validates bulk fetch and delete.
///
/// Assertions:
/// - Confirms unknown ids are skipped by `get_many`
/// - Confirms `delete` reports whether a row existed
#[tokio::test]
async fn get_many_and_delete() {
    let db = TestDatabase::new();
    for id in ["a", "b"] {
        db.store.put(&operation(id, OperationType::AuditLog, ts(1))).await.unwrap();
    }

    let ids = vec!["a".to_string(), "zzz".to_string(), "b".to_string()];
    assert_eq!(db.store.get_many(&ids).await.unwrap().len(), 2);

    assert!(db.store.delete("a").await.unwrap());
    assert!(!db.store.delete("a").await.unwrap());
}

/// Validates the queue survives reopening the database.
///
/// Assertions:
/// - Confirms a second store over the same manager sees committed rows
#[tokio::test]
async fn rows_are_visible_to_a_fresh_store() {
    let db = TestDatabase::new();
    db.store.put(&operation("a", OperationType::ShiftAction, ts(1))).await.unwrap();

    let reopened = shiftsync_infra::SqliteOperationStore::new(std::sync::Arc::clone(&db.manager));

    assert!(reopened.get("a").await.unwrap().is_some());
    assert_eq!(db.manager.schema_version().unwrap(), 1);
}
