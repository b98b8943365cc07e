//! Background sync services
//!
//! - [`SyncWorker`]: runs engine cycles on triggers and on an interval
//! - [`ConnectivityProbe`]: health-check reachability into the network monitor
//! - [`PollingWakeTrigger`]: wake trigger backed by the probe

pub mod probe;
pub mod wake;
pub mod worker;

pub use probe::ConnectivityProbe;
pub use wake::PollingWakeTrigger;
pub use worker::{SyncWorker, SyncWorkerConfig};
