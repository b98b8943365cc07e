//! Domain types and models

pub mod events;
pub mod operation;
pub mod queue;
pub mod strategy;

pub use events::{CycleReport, SyncEvent, SyncTrigger};
pub use operation::{Operation, OperationStatus, OperationType, OwnerContext, Priority};
pub use queue::{EnqueueOptions, QueueStatus, StatusCounts};
pub use strategy::{HandlingMode, SyncStrategy};
