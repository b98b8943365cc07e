//! Domain constants
//!
//! Centralized defaults shared by the engine, the store, and the config
//! loader.

// Queue defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_MAX_RETRY_DELAY_SECS: u64 = 3600;
pub const DEFAULT_BATCH_SIZE: usize = 10;

// Operation ids: `<type>_<epoch millis>_<suffix>`
pub const OPERATION_ID_SUFFIX_LEN: usize = 9;

// Stored failure reasons are truncated to this many characters
pub const MAX_ERROR_LENGTH: usize = 256;

// Worker and transport defaults
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;

// Secondary domain events emitted by handlers
pub const EVENT_FORM_SUBMITTED: &str = "form-submitted";
pub const EVENT_SHIFT_ACTION_CONFIRMED: &str = "shift-action-confirmed";
pub const EVENT_EMERGENCY_DELIVERED: &str = "emergency-report-delivered";
