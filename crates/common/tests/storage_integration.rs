//! Integration tests for the pooled SQLite storage layer.

#![cfg(all(feature = "platform", feature = "test-utils"))]

use shiftsync_common::storage::{SqlitePool, SqlitePoolConfig};
use shiftsync_common::testing::TempDir;

/// Validates committed writes are visible after the pool is dropped and
/// reopened.
///
/// Assertions:
/// - Confirms the row written through the first pool is read by the second.
#[test]
fn writes_survive_reopen() {
    let temp = TempDir::new("storage-reopen").expect("temp dir");
    let path = temp.path().join("queue.db");

    {
        let pool = SqlitePool::open(&path, None, SqlitePoolConfig::default()).expect("pool");
        let conn = pool.get().expect("conn");
        conn.execute_batch("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT NOT NULL);")
            .expect("ddl");
        conn.execute("INSERT INTO kv (k, v) VALUES ('a', 'b')", []).expect("insert");
    }

    let pool = SqlitePool::open(&path, None, SqlitePoolConfig::default()).expect("reopen");
    let value: String = pool
        .get()
        .expect("conn")
        .query_row("SELECT v FROM kv WHERE k = 'a'", [], |row| row.get(0))
        .expect("row");
    assert_eq!(value, "b");
}

/// Validates an encrypted database round-trips with the same key.
#[test]
fn encrypted_database_reopens_with_same_key() {
    let temp = TempDir::new("storage-key").expect("temp dir");
    let path = temp.path().join("queue.db");
    let key = Some("integration_key".to_string());

    {
        let pool = SqlitePool::open(&path, key.clone(), SqlitePoolConfig::default()).expect("pool");
        pool.get().expect("conn").execute_batch("CREATE TABLE t (id INTEGER);").expect("ddl");
    }

    let pool = SqlitePool::open(&path, key, SqlitePoolConfig::default()).expect("reopen");
    let (connections, _) = pool.state();
    assert!(connections >= 1);
}
