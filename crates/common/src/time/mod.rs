//! Time abstractions
//!
//! The sync engine never reads the wall clock directly. It asks a [`Clock`]
//! so that retry schedules, readiness checks, and retention windows can be
//! driven deterministically in tests with [`MockClock`].

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
