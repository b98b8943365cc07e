//! # ShiftSync Core
//!
//! Sync engine logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (operation store, submitter, wake trigger, fallback)
//! - The sync engine, retry manager, dispatcher and type handlers
//! - Event bus and network state monitor
//! - An in-memory store for tests and ephemeral hosts
//!
//! ## Architecture Principles
//! - Depends only on `shiftsync-common` and `shiftsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod sync;

pub use sync::engine::{EngineConfig, SyncEngine, SyncEngineBuilder};
pub use sync::errors::{SubmissionError, SubmissionErrorCategory};
pub use sync::events::EventBus;
pub use sync::memory_store::InMemoryOperationStore;
pub use sync::network::NetworkMonitor;
pub use sync::ports::{
    FallbackAction, ItemOutcome, ItemResult, OperationStore, SubmissionItem, SubmissionReceipt,
    SubmissionRequest, Submitter, WakeTrigger,
};
pub use sync::strategies::StrategyRegistry;
