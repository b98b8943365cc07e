//! SQLCipher key handling
//!
//! The queue database is encrypted when a key is configured; without one it
//! is a plain SQLite file.

use rusqlite::Connection;
use tracing::debug;

use crate::storage::error::{StorageError, StorageResult};

/// Apply the SQLCipher key. Must run before any other statement on the
/// connection.
pub fn apply_encryption_key(conn: &Connection, key: &str) -> StorageResult<()> {
    conn.pragma_update(None, "key", key)
        .map_err(|e| StorageError::Encryption(format!("Failed to set key: {}", e)))?;
    conn.pragma_update(None, "cipher_compatibility", 4)
        .map_err(|e| StorageError::Encryption(format!("Failed to set compatibility: {}", e)))?;
    debug!("SQLCipher key applied");
    Ok(())
}
