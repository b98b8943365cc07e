// Error types for retry module
use std::time::Duration;

use thiserror::Error;

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Errors that can occur while configuring retry behaviour
#[derive(Debug, Error)]
pub enum RetryError {
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ErrorClassification for RetryError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Common(e) => e.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Common(e) => e.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        match self {
            Self::Common(e) => e.is_critical(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Result type for retry operations
pub type RetryResult<T> = Result<T, RetryError>;
