// Retry module with exponential backoff

pub mod backoff;
pub mod constants;
pub mod error;

pub use backoff::BackoffPolicy;
pub use error::{RetryError, RetryResult};
