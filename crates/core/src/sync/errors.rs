//! Submission error taxonomy
//!
//! Every failure reported by the submission boundary lands in one of three
//! categories, and the category alone decides what the retry manager does
//! with the operation.

use std::time::Duration;

use shiftsync_common::{ErrorClassification, ErrorSeverity};
use shiftsync_domain::ShiftSyncError;
use thiserror::Error;

/// What the retry manager does with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionErrorCategory {
    /// Device is offline or the host is unreachable. The operation goes back
    /// to pending without consuming a retry.
    Connectivity,
    /// 5xx, 429, or timeout. Retried with backoff up to `max_retries`.
    Transient,
    /// Validation or other 4xx. Failed immediately.
    Permanent,
}

/// Failure reported by a [`Submitter`](super::ports::Submitter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Submission timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid submission: {0}")]
    Invalid(String),
}

impl SubmissionError {
    pub fn category(&self) -> SubmissionErrorCategory {
        match self {
            Self::Connectivity(_) => SubmissionErrorCategory::Connectivity,
            Self::Server { .. } | Self::RateLimited { .. } | Self::Timeout(_) | Self::Transient(_) => {
                SubmissionErrorCategory::Transient
            }
            Self::Rejected { .. } | Self::Invalid(_) => SubmissionErrorCategory::Permanent,
        }
    }

    pub fn consumes_retry(&self) -> bool {
        self.category() == SubmissionErrorCategory::Transient
    }
}

impl ErrorClassification for SubmissionError {
    fn is_retryable(&self) -> bool {
        self.category() != SubmissionErrorCategory::Permanent
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            SubmissionErrorCategory::Connectivity => ErrorSeverity::Info,
            SubmissionErrorCategory::Transient => ErrorSeverity::Warning,
            SubmissionErrorCategory::Permanent => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Convert from ShiftSyncError to SubmissionError
impl From<ShiftSyncError> for SubmissionError {
    fn from(err: ShiftSyncError) -> Self {
        match err {
            ShiftSyncError::Network(message) => Self::Connectivity(message),
            ShiftSyncError::InvalidInput(message) | ShiftSyncError::Serialization(message) => {
                Self::Invalid(message)
            }
            ShiftSyncError::NotFound(message) => Self::Rejected { status: 404, message },
            ShiftSyncError::Database(message)
            | ShiftSyncError::Config(message)
            | ShiftSyncError::Internal(message) => Self::Transient(message),
        }
    }
}
