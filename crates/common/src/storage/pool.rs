//! SQLite connection pool
//!
//! r2d2 pool whose connection initializer applies the optional SQLCipher key
//! followed by the connection pragmas.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::cipher::apply_encryption_key;
use super::config::SqlitePoolConfig;
use super::error::{looks_like_wrong_key, StorageError, StorageResult};
use super::pragmas::apply_connection_pragmas;

/// A connection checked out of [`SqlitePool`].
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pooled SQLite connections for one database file.
#[derive(Debug, Clone)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlitePoolConfig,
}

impl SqlitePool {
    /// Open (or create) the database at `path`.
    ///
    /// A test connection is checked out immediately so a wrong key surfaces
    /// here as [`StorageError::WrongKeyOrNotEncrypted`] rather than on the
    /// first query.
    #[instrument(skip(encryption_key), fields(db_path = ?path, pool_size = config.max_size))]
    pub fn open(
        path: &Path,
        encryption_key: Option<String>,
        config: SqlitePoolConfig,
    ) -> StorageResult<Self> {
        info!("Creating SQLite connection pool");

        let pool_config = config.clone();
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(key) = encryption_key.as_deref() {
                apply_encryption_key(conn, key)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            }
            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| classify_open_error("Failed to create pool", &e))?;

        {
            let conn =
                pool.get().map_err(|e| classify_open_error("Failed to get test connection", &e))?;
            conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
                .map_err(|e| {
                    if looks_like_wrong_key(&e.to_string()) {
                        StorageError::WrongKeyOrNotEncrypted
                    } else {
                        StorageError::Query(e.to_string())
                    }
                })?;
            debug!("Test connection verified");
        }

        info!(max_size = config.max_size, "SQLite pool created");
        Ok(Self { pool, config })
    }

    /// Check out a connection.
    pub fn get(&self) -> StorageResult<PooledConnection> {
        self.pool.get().map_err(|e| {
            if e.to_string().to_lowercase().contains("timed out") {
                warn!(timeout = ?self.config.connection_timeout, "Connection timeout");
                StorageError::Timeout(self.config.connection_timeout.as_secs())
            } else {
                warn!(error = %e, "Connection error");
                StorageError::Connection(format!("Failed to get connection: {}", e))
            }
        })
    }

    /// Current `(connections, idle_connections)`.
    pub fn state(&self) -> (u32, u32) {
        let state = self.pool.state();
        (state.connections, state.idle_connections)
    }

    pub fn max_size(&self) -> u32 {
        self.config.max_size
    }
}

fn classify_open_error(context: &str, err: &r2d2::Error) -> StorageError {
    warn!(error = %err, "{}", context);
    if looks_like_wrong_key(&err.to_string()) {
        StorageError::WrongKeyOrNotEncrypted
    } else {
        StorageError::Connection(format!("{}: {}", context, err))
    }
}
