// Exponential backoff policy with a delay cap and optional jitter
use std::time::Duration;

use rand::Rng;

use crate::error::CommonError;
use crate::sync::retry::constants::{
    DEFAULT_BASE_DELAY, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_DELAY, MAX_BACKOFF_EXPONENT,
};
use crate::sync::retry::error::RetryResult;

/// Backoff policy: `base * 2^(retry_number - 1)`, capped at `max_delay`.
///
/// `retry_number` is 1-based, so the first retry waits exactly `base_delay`,
/// the second `2 * base_delay`, and so on. Jitter is off by default so the
/// schedule is deterministic; set a factor to spread reconnect storms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl BackoffPolicy {
    /// Policy with the given base delay and the default one hour cap.
    ///
    /// A base larger than the default cap raises the cap to match.
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay, max_delay: DEFAULT_MAX_DELAY.max(base_delay), ..Self::default() }
    }

    /// Create a custom policy with validation
    pub fn custom(base_delay: Duration, max_delay: Duration) -> RetryResult<Self> {
        if base_delay > max_delay {
            return Err(CommonError::config(format!(
                "base_delay ({:?}) cannot be greater than max_delay ({:?})",
                base_delay, max_delay
            ))
            .into());
        }

        Ok(Self { base_delay, max_delay, jitter_factor: DEFAULT_JITTER_FACTOR })
    }

    /// Set the maximum delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> RetryResult<Self> {
        if delay < self.base_delay {
            return Err(CommonError::config(format!(
                "max_delay ({:?}) cannot be less than base_delay ({:?})",
                delay, self.base_delay
            ))
            .into());
        }
        self.max_delay = delay;
        Ok(self)
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay before the given (1-based) retry.
    pub fn delay_for_retry(&self, retry_number: u32) -> Duration {
        let exponent = retry_number.saturating_sub(1);
        self.apply_jitter(self.exponential_delay(exponent))
    }

    fn exponential_delay(&self, exponent: u32) -> Duration {
        let base_millis = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_millis = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        let multiplier = 2_u64.saturating_pow(exponent.min(MAX_BACKOFF_EXPONENT));
        let delay_millis = base_millis.saturating_mul(multiplier).min(max_millis);

        Duration::from_millis(delay_millis)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        let delay_millis = delay.as_millis() as f64;
        let jitter_range = delay_millis * self.jitter_factor;

        // -jitter_range/2 to +jitter_range/2, never above the cap
        let jitter = rng.gen_range(-jitter_range / 2.0..=jitter_range / 2.0);
        let final_millis = (delay_millis + jitter).max(0.0) as u64;

        Duration::from_millis(final_millis).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_retry_waits_base_delay() {
        let policy = BackoffPolicy::new(Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_retry(3), Duration::from_secs(8));
    }

    #[test]
    fn delay_is_capped() {
        let policy = BackoffPolicy::custom(Duration::from_secs(10), Duration::from_secs(60))
            .expect("valid policy");
        assert_eq!(policy.delay_for_retry(4), Duration::from_secs(60));
        assert_eq!(policy.delay_for_retry(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn zero_retry_number_is_treated_as_first() {
        let policy = BackoffPolicy::new(Duration::from_secs(1));
        assert_eq!(policy.delay_for_retry(0), Duration::from_secs(1));
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(BackoffPolicy::custom(Duration::from_secs(5), Duration::from_secs(1)).is_err());
        assert!(BackoffPolicy::new(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(1))
            .is_err());
    }

    #[test]
    fn jitter_stays_within_cap() {
        let policy = BackoffPolicy::custom(Duration::from_secs(1), Duration::from_secs(4))
            .expect("valid policy")
            .with_jitter_factor(1.0);
        for retry in 1..10 {
            assert!(policy.delay_for_retry(retry) <= Duration::from_secs(4));
        }
    }
}
