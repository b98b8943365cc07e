// Constants for retry module
use std::time::Duration;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (one hour)
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3600);

/// Default jitter factor (0.0 = no jitter, 1.0 = full jitter)
pub const DEFAULT_JITTER_FACTOR: f64 = 0.0;

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;
