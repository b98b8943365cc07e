//! Database implementations

pub mod manager;
pub mod operation_repository;

pub use manager::DbManager;
pub use operation_repository::SqliteOperationStore;
