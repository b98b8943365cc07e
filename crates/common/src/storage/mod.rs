//! Storage primitives for the durable operation queue
//!
//! r2d2-pooled SQLite connections with per-connection pragmas (WAL, busy
//! timeout, foreign keys) and an optional SQLCipher key.

pub mod cipher;
pub mod config;
pub mod error;
pub mod pool;
pub mod pragmas;

// Re-export commonly used types
pub use cipher::apply_encryption_key;
pub use config::SqlitePoolConfig;
pub use error::{StorageError, StorageResult};
pub use pool::{PooledConnection, SqlitePool};
pub use pragmas::apply_connection_pragmas;
