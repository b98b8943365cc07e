//! Synchronization primitives shared by the sync engine
//!
//! - **`retry`**: exponential backoff policy with a delay cap and optional
//!   jitter, used to compute `scheduled_for` after a transient failure.

pub mod retry;

pub use retry::{BackoffPolicy, RetryError, RetryResult};

// Re-export time abstractions so callers can pair a policy with a clock
pub use crate::time::{Clock, MockClock, SystemClock};
