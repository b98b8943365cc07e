//! Shared fixtures for `shiftsync-infra` integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use shiftsync_common::testing::TempDir;
use shiftsync_domain::{Operation, OperationStatus, OperationType, OwnerContext, Priority};
use shiftsync_infra::database::{DbManager, SqliteOperationStore};

const TEST_DB_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Temporary encrypted database that lives as long as the struct.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    pub store: Arc<SqliteOperationStore>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new("infra-test").expect("temp dir should be created");
        let db_path = temp_dir.path().join("queue.db");

        let manager =
            DbManager::new(&db_path, 4, Some(TEST_DB_KEY)).expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");
        let manager = Arc::new(manager);
        let store = Arc::new(SqliteOperationStore::new(Arc::clone(&manager)));

        Self { manager, store, _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Millisecond-aligned timestamp, matching what the store persists.
pub fn ts(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().expect("valid timestamp")
}

pub fn operation(id: &str, op_type: OperationType, created_at: DateTime<Utc>) -> Operation {
    Operation {
        id: id.to_string(),
        op_type,
        priority: Priority::Medium,
        payload: json!({ "id": id }),
        created_at,
        updated_at: created_at,
        scheduled_for: None,
        retry_count: 0,
        max_retries: 3,
        last_attempt: None,
        status: OperationStatus::Pending,
        network_required: true,
        dependencies: Vec::new(),
        owner: OwnerContext::default(),
        last_error: None,
    }
}
