//! Database connection manager backed by the shared SQLite pool.

use std::path::{Path, PathBuf};

use rusqlite::params;
use shiftsync_common::storage::{PooledConnection, SqlitePool, SqlitePoolConfig};
use shiftsync_domain::{DatabaseConfig, Result};
use tracing::info;

use crate::errors::{map_sql_error, map_storage_error};

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Database manager that wraps a [`SqlitePool`].
#[derive(Debug)]
pub struct DbManager {
    pool: SqlitePool,
    path: PathBuf,
}

impl DbManager {
    /// Open the database with the given pool size and optional SQLCipher key.
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        pool_size: u32,
        encryption_key: Option<&str>,
    ) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let config = SqlitePoolConfig::default().with_max_size(pool_size.max(1));

        let pool = SqlitePool::open(&path, encryption_key.map(str::to_owned), config)
            .map_err(map_storage_error)?;

        info!(
            db_path = %path.display(),
            max_connections = pool.max_size(),
            encrypted = encryption_key.is_some(),
            "sqlite pool initialised"
        );

        Ok(Self { pool, path })
    }

    /// Open from configuration and run migrations.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let manager =
            Self::new(&config.path, config.pool_size, config.encryption_key.as_deref())?;
        manager.run_migrations()?;
        Ok(manager)
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<PooledConnection> {
        self.pool.get().map_err(map_storage_error)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
            params![SCHEMA_VERSION],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    /// Highest applied schema version.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
            .map_err(map_sql_error)
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the database is accessible and responding.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }
}
