//! Configuration structures
//!
//! Loaded by `shiftsync_infra::config` from environment variables or a
//! JSON/TOML file. Every section has serde defaults so a file only needs the
//! fields it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DB_POOL_SIZE, DEFAULT_EVENT_CAPACITY, DEFAULT_MAX_RETRY_DELAY_SECS,
    DEFAULT_RETENTION_DAYS, DEFAULT_SHUTDOWN_TIMEOUT_SECS, DEFAULT_SUBMIT_TIMEOUT_SECS,
    DEFAULT_SYNC_INTERVAL_SECS,
};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub submission: SubmissionConfig,
    pub logging: LoggingConfig,
}

/// Durable queue database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    /// SQLCipher key. The database is plain SQLite when absent.
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "shiftsync.db".to_string(),
            pool_size: DEFAULT_DB_POOL_SIZE,
            encryption_key: None,
        }
    }
}

/// Engine and worker behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Periodic cycle interval while the worker runs.
    pub interval_seconds: u64,
    pub retention_days: u32,
    pub max_retry_delay_seconds: u64,
    pub event_capacity: usize,
    pub shutdown_timeout_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: DEFAULT_SYNC_INTERVAL_SECS,
            retention_days: DEFAULT_RETENTION_DAYS,
            max_retry_delay_seconds: DEFAULT_MAX_RETRY_DELAY_SECS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            shutdown_timeout_seconds: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_secs(self.max_retry_delay_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Submission endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    /// Optional connectivity probe path, e.g. `/health`.
    pub health_path: Option<String>,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_seconds: DEFAULT_SUBMIT_TIMEOUT_SECS,
            auth_token: None,
            health_path: None,
        }
    }
}

impl SubmissionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
