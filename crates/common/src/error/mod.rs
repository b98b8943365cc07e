//! Common error types shared across ShiftSync crates
//!
//! The error handling system is built on three pieces:
//!
//! 1. **`CommonError`**: error patterns shared by more than one module
//!    (currently configuration validation).
//! 2. **`ErrorClassification`**: a standard interface for classifying errors
//!    by retryability and severity. The sync engine leans on it to decide
//!    whether a failed submission consumes a retry.
//! 3. **`ErrorSeverity`**: a unified severity scale for logging.
//!
//! Module-specific errors compose with `CommonError` instead of duplicating
//! its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum StoreError {
//!     #[error("Row is corrupt: {0}")]
//!     Corrupt(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Error variants shared by more than one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Invalid configuration, e.g. a backoff cap below its base delay
    Config { message: String },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message } => write!(f, "Configuration error: {}", message),
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }
}

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again: network timeouts, lock contention, temporary service
    /// unavailability.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when a specific delay is recommended (e.g.
    /// from a `Retry-After` header).
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
