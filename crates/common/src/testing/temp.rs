//! Temporary directory helpers
//!
//! RAII wrapper for directories holding throwaway databases.

use std::io;
use std::path::{Path, PathBuf};

/// Temporary directory that is automatically deleted when dropped
///
/// # Examples
///
/// ```
/// use shiftsync_common::testing::TempDir;
///
/// let temp_dir = TempDir::new("queue-test").unwrap();
/// let db_path = temp_dir.path().join("queue.db");
/// assert!(db_path.starts_with(temp_dir.path()));
/// ```
#[derive(Debug)]
pub struct TempDir {
    inner: tempfile::TempDir,
}

impl TempDir {
    /// Create a new temporary directory with a prefix
    pub fn new(prefix: &str) -> io::Result<Self> {
        let inner = tempfile::Builder::new().prefix(&format!("{prefix}-")).tempdir()?;
        Ok(Self { inner })
    }

    /// Get the path to the temporary directory
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file in the temporary directory
    pub fn create_file(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let file_path = self.path().join(name);
        std::fs::write(&file_path, contents)?;
        Ok(file_path)
    }
}
