//! SQLite-backed implementation of the operation store port.
//!
//! Every call runs on the blocking pool and commits before returning.
//! Timestamps are stored as epoch milliseconds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use shiftsync_core::OperationStore;
use shiftsync_domain::{
    Operation, OperationStatus, OperationType, OwnerContext, Priority, Result as DomainResult,
    StatusCounts,
};
use tokio::task;
use tracing::{debug, instrument, warn};

use super::manager::DbManager;
use crate::errors::{map_join_error, map_sql_error};

/// Keeps `IN (...)` lists well under SQLite's variable limit.
const ID_CHUNK: usize = 500;

/// SQLite-backed operation store.
#[derive(Debug, Clone)]
pub struct SqliteOperationStore {
    db: Arc<DbManager>,
}

impl SqliteOperationStore {
    /// Construct a store backed by the shared manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn run<T, F>(&self, work: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> DomainResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<T> {
            let mut conn = db.get_connection()?;
            work(&mut conn)
        })
        .await
        .map_err(map_join_error)?
    }

    fn upsert(conn: &Connection, op: &Operation) -> DomainResult<()> {
        let payload = serde_json::to_string(&op.payload)?;
        let dependencies = serde_json::to_string(&op.dependencies)?;

        conn.execute(
            UPSERT_SQL,
            params![
                op.id,
                op.op_type.as_str(),
                op.priority.to_string(),
                payload,
                op.created_at.timestamp_millis(),
                op.updated_at.timestamp_millis(),
                op.scheduled_for.map(|t| t.timestamp_millis()),
                op.retry_count,
                op.max_retries,
                op.last_attempt.map(|t| t.timestamp_millis()),
                op.status.to_string(),
                op.network_required,
                dependencies,
                op.owner.device_id,
                op.owner.user_id,
                op.owner.restaurant_id,
                op.last_error,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    fn select_where(
        conn: &Connection,
        clause: &str,
        params: impl rusqlite::Params,
    ) -> DomainResult<Vec<Operation>> {
        let sql = format!("{SELECT_SQL} WHERE {clause} ORDER BY created_at ASC, id ASC");
        let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
        let rows = stmt.query_map(params, map_operation_row).map_err(map_sql_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
    }

    fn select_one(conn: &Connection, id: &str) -> DomainResult<Option<Operation>> {
        let sql = format!("{SELECT_SQL} WHERE id = ?1");
        conn.query_row(&sql, params![id], map_operation_row).optional().map_err(map_sql_error)
    }
}

#[async_trait]
impl OperationStore for SqliteOperationStore {
    #[instrument(skip(self, operation), fields(operation_id = %operation.id))]
    async fn put(&self, operation: &Operation) -> DomainResult<()> {
        let op = operation.clone();
        self.run(move |conn| Self::upsert(conn, &op)).await
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Operation>> {
        let id = id.to_string();
        self.run(move |conn| Self::select_one(conn, &id)).await
    }

    async fn get_many(&self, ids: &[String]) -> DomainResult<Vec<Operation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.run(move |conn| {
            let mut found = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(ID_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let clause = format!("id IN ({placeholders})");
                found.extend(Self::select_where(conn, &clause, params_from_iter(chunk.iter()))?);
            }
            Ok(found)
        })
        .await
    }

    async fn query_by_status(&self, status: OperationStatus) -> DomainResult<Vec<Operation>> {
        let status = status.to_string();
        self.run(move |conn| Self::select_where(conn, "status = ?1", params![status])).await
    }

    async fn query_by_type(&self, op_type: &OperationType) -> DomainResult<Vec<Operation>> {
        let op_type = op_type.as_str().to_string();
        self.run(move |conn| Self::select_where(conn, "op_type = ?1", params![op_type])).await
    }

    async fn delete(&self, id: &str) -> DomainResult<bool> {
        let id = id.to_string();
        self.run(move |conn| {
            let removed = conn
                .execute("DELETE FROM operations WHERE id = ?1", params![id])
                .map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    async fn claim(&self, ids: &[String], now: DateTime<Utc>) -> DomainResult<Vec<Operation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        let now_ms = now.timestamp_millis();

        let claimed = self
            .run(move |conn| {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(map_sql_error)?;
                let mut claimed = Vec::with_capacity(ids.len());
                for id in &ids {
                    let changed = tx
                        .execute(
                            "UPDATE operations SET status = 'processing', last_attempt = ?2, updated_at = ?2
                             WHERE id = ?1 AND status = 'pending'",
                            params![id, now_ms],
                        )
                        .map_err(map_sql_error)?;
                    if changed == 1 {
                        if let Some(op) = Self::select_one(&tx, id)? {
                            claimed.push(op);
                        }
                    }
                }
                tx.commit().map_err(map_sql_error)?;
                Ok(claimed)
            })
            .await?;

        debug!(claimed = claimed.len(), "claimed operations");
        Ok(claimed)
    }

    async fn recover_interrupted(&self) -> DomainResult<usize> {
        self.run(|conn| {
            conn.execute("UPDATE operations SET status = 'pending' WHERE status = 'processing'", [])
                .map_err(map_sql_error)
        })
        .await
    }

    async fn status_counts(&self) -> DomainResult<StatusCounts> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM operations GROUP BY status")
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(map_sql_error)?;

            let mut counts = StatusCounts::default();
            for row in rows {
                let (status, count) = row.map_err(map_sql_error)?;
                let count = usize::try_from(count).unwrap_or(0);
                match status.as_str() {
                    "pending" => counts.pending += count,
                    "processing" => counts.processing += count,
                    "completed" => counts.completed += count,
                    "failed" => counts.failed += count,
                    other => warn!(status = other, count, "unknown status in operations table"),
                }
            }
            Ok(counts)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let cutoff_ms = cutoff.timestamp_millis();
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM operations
                 WHERE status IN ('completed', 'failed')
                   AND COALESCE(last_attempt, updated_at) < ?1",
                params![cutoff_ms],
            )
            .map_err(map_sql_error)
        })
        .await
    }

    async fn reset_failed(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let now_ms = now.timestamp_millis();
        self.run(move |conn| {
            conn.execute(
                "UPDATE operations
                 SET status = 'pending', retry_count = 0, scheduled_for = NULL, updated_at = ?1
                 WHERE status = 'failed'",
                params![now_ms],
            )
            .map_err(map_sql_error)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn reset_for_retry(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Operation>> {
        let id = id.to_string();
        let now_ms = now.timestamp_millis();
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;
            let changed = tx
                .execute(
                    "UPDATE operations
                     SET retry_count = CASE WHEN status = 'failed' THEN 0 ELSE retry_count END,
                         status = 'pending', scheduled_for = NULL, updated_at = ?2
                     WHERE id = ?1 AND status IN ('pending', 'failed')",
                    params![id, now_ms],
                )
                .map_err(map_sql_error)?;
            let reset = if changed == 1 { Self::select_one(&tx, &id)? } else { None };
            tx.commit().map_err(map_sql_error)?;
            Ok(reset)
        })
        .await
    }
}

const UPSERT_SQL: &str = "INSERT OR REPLACE INTO operations (
        id, op_type, priority, payload_json, created_at, updated_at, scheduled_for, retry_count,
        max_retries, last_attempt, status, network_required, dependencies_json, device_id,
        user_id, restaurant_id, last_error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";

const SELECT_SQL: &str = "SELECT
        id, op_type, priority, payload_json, created_at, updated_at, scheduled_for, retry_count,
        max_retries, last_attempt, status, network_required, dependencies_json, device_id,
        user_id, restaurant_id, last_error
    FROM operations";

fn map_operation_row(row: &Row<'_>) -> rusqlite::Result<Operation> {
    let id: String = row.get(0)?;
    let op_type: String = row.get(1)?;
    let priority_raw: String = row.get(2)?;
    let payload_raw: String = row.get(3)?;
    let status_raw: String = row.get(10)?;
    let dependencies_raw: String = row.get(12)?;

    let payload = serde_json::from_str(&payload_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;
    let dependencies = serde_json::from_str(&dependencies_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(Operation {
        priority: parse_priority(&id, &priority_raw),
        status: parse_status(&id, &status_raw),
        op_type: OperationType::from(op_type),
        payload,
        created_at: millis(row.get(4)?),
        updated_at: millis(row.get(5)?),
        scheduled_for: row.get::<_, Option<i64>>(6)?.map(millis),
        retry_count: row.get(7)?,
        max_retries: row.get(8)?,
        last_attempt: row.get::<_, Option<i64>>(9)?.map(millis),
        network_required: row.get(11)?,
        dependencies,
        owner: OwnerContext {
            device_id: row.get(13)?,
            user_id: row.get(14)?,
            restaurant_id: row.get(15)?,
        },
        last_error: row.get(16)?,
        id,
    })
}

fn millis(value: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value).unwrap_or_default()
}

fn parse_status(id: &str, raw: &str) -> OperationStatus {
    match raw.parse::<OperationStatus>() {
        Ok(status) => status,
        Err(err) => {
            warn!(
                operation_id = %id,
                raw_status = %raw,
                error = %err,
                "invalid operation status in database, defaulting to pending"
            );
            OperationStatus::Pending
        }
    }
}

fn parse_priority(id: &str, raw: &str) -> Priority {
    raw.parse::<Priority>().unwrap_or_else(|err| {
        warn!(operation_id = %id, raw_priority = %raw, error = %err, "invalid priority, using medium");
        Priority::Medium
    })
}
