//! # ShiftSync Infrastructure
//!
//! Infrastructure implementations of the sync engine's ports.
//!
//! This crate contains:
//! - SQLite/SQLCipher operation store
//! - HTTP submitter and connectivity probe
//! - Configuration loading and logging setup
//! - Background sync worker
//!
//! ## Architecture
//! - Implements traits defined in `shiftsync-core`
//! - Contains all "impure" code (disk, network, global subscriber)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;
pub mod sync;

pub use database::{DbManager, SqliteOperationStore};
pub use errors::InfraError;
pub use http::{HttpClient, HttpSubmitter};
pub use observability::init_logging;
pub use sync::{ConnectivityProbe, PollingWakeTrigger, SyncWorker, SyncWorkerConfig};
