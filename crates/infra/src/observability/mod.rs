//! Logging setup for hosts embedding the sync engine

pub mod logging;

pub use logging::{build_filter, init_logging};
