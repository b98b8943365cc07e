//! Testing utilities and helpers
//!
//! - **[`temp`]**: temporary directories for on-disk databases
//! - **[`async_utils`]**: polling helpers for background tasks

pub mod async_utils;
pub mod temp;

pub use async_utils::poll_until;
pub use temp::TempDir;
