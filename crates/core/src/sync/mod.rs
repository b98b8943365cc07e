//! Background synchronization engine
//!
//! Leaf-first:
//! - [`ports`]: store, submission, wake and fallback boundaries
//! - [`network`], [`events`]: trigger source and event fan-out
//! - [`resolver`], [`retry`], [`merge`], [`handlers`], [`dispatcher`]
//! - [`engine`]: the cycle itself

pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod ids;
pub mod index;
pub mod memory_store;
pub mod merge;
pub mod network;
pub mod ports;
pub mod resolver;
pub mod retention;
pub mod retry;
pub mod scheduler;
pub mod strategies;

pub use dispatcher::{plan_groups, BatchDispatcher, DispatchGroup, DispatchPlan};
pub use engine::{EngineConfig, SyncEngine, SyncEngineBuilder};
pub use errors::{SubmissionError, SubmissionErrorCategory};
pub use events::{EventBus, Listener, ListenerId};
pub use handlers::{BatchedHandler, IndividualHandler, MergeHandler, OperationResult, TypeHandler};
pub use ids::generate_operation_id;
pub use index::PendingIndex;
pub use memory_store::InMemoryOperationStore;
pub use merge::{merge_operations, MergedRecord};
pub use network::NetworkMonitor;
pub use ports::{
    FallbackAction, ItemOutcome, ItemResult, OperationStore, SubmissionItem, SubmissionReceipt,
    SubmissionRequest, Submitter, WakeTrigger,
};
pub use resolver::{DependencyResolver, Readiness};
pub use retention::{CleanupStats, RetentionCleaner};
pub use retry::{FailureOutcome, RetryManager};
pub use scheduler::RetryScheduler;
pub use strategies::StrategyRegistry;
