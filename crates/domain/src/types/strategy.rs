//! Per-type sync strategies

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::operation::{OperationType, Priority};
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES, EVENT_EMERGENCY_DELIVERED, EVENT_FORM_SUBMITTED,
    EVENT_SHIFT_ACTION_CONFIRMED,
};

/// How a type's operations are handed to the submission boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlingMode {
    /// One call per operation.
    Individual,
    /// One call carrying every operation in the group.
    Batched,
    /// Operations for the same entity are folded into one record first.
    Merge,
}

crate::impl_domain_status_conversions!(HandlingMode {
    Individual => "individual",
    Batched => "batched",
    Merge => "merge",
});

/// Static delivery policy for one operation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStrategy {
    pub priority: Priority,
    /// Attempt delivery at enqueue time when online.
    pub immediate: bool,
    pub base_retry_delay: Duration,
    pub max_retries: u32,
    /// Most operations of this type handed to the dispatcher per cycle.
    pub batch_size: usize,
    pub network_required: bool,
    pub handling: HandlingMode,
    /// Secondary event emitted after a successful submission.
    pub confirmation_event: Option<String>,
}

impl SyncStrategy {
    /// Built-in defaults for `op_type`. Custom tags get a medium priority,
    /// individually submitted strategy.
    pub fn defaults_for(op_type: &OperationType) -> Self {
        match op_type {
            OperationType::EmergencyReport => Self {
                priority: Priority::Critical,
                immediate: true,
                base_retry_delay: Duration::from_secs(1),
                max_retries: 5,
                batch_size: 10,
                network_required: true,
                handling: HandlingMode::Individual,
                confirmation_event: Some(EVENT_EMERGENCY_DELIVERED.to_string()),
            },
            OperationType::FormSubmission => Self {
                priority: Priority::High,
                immediate: true,
                base_retry_delay: Duration::from_secs(2),
                max_retries: 3,
                batch_size: 5,
                network_required: true,
                handling: HandlingMode::Individual,
                confirmation_event: Some(EVENT_FORM_SUBMITTED.to_string()),
            },
            OperationType::ShiftAction => Self {
                priority: Priority::High,
                immediate: true,
                base_retry_delay: Duration::from_secs(1),
                max_retries: 5,
                batch_size: 10,
                network_required: true,
                handling: HandlingMode::Individual,
                confirmation_event: Some(EVENT_SHIFT_ACTION_CONFIRMED.to_string()),
            },
            OperationType::SopAccess => Self {
                priority: Priority::Medium,
                immediate: false,
                base_retry_delay: Duration::from_secs(5),
                max_retries: 3,
                batch_size: 10,
                network_required: true,
                handling: HandlingMode::Batched,
                confirmation_event: None,
            },
            OperationType::TrainingProgress => Self {
                priority: Priority::Medium,
                immediate: false,
                base_retry_delay: Duration::from_secs(5),
                max_retries: 5,
                batch_size: 20,
                network_required: true,
                handling: HandlingMode::Merge,
                confirmation_event: None,
            },
            OperationType::AuditLog => Self {
                priority: Priority::Low,
                immediate: false,
                base_retry_delay: Duration::from_secs(10),
                max_retries: 10,
                batch_size: 50,
                network_required: true,
                handling: HandlingMode::Batched,
                confirmation_event: None,
            },
            OperationType::Custom(_) => Self {
                priority: Priority::Medium,
                immediate: false,
                base_retry_delay: Duration::from_secs(5),
                max_retries: DEFAULT_MAX_RETRIES,
                batch_size: DEFAULT_BATCH_SIZE,
                network_required: true,
                handling: HandlingMode::Individual,
                confirmation_event: None,
            },
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    /// Zero is clamped to one so a type can never be starved entirely.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_handling(mut self, handling: HandlingMode) -> Self {
        self.handling = handling;
        self
    }

    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn with_network_required(mut self, required: bool) -> Self {
        self.network_required = required;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_reports_are_critical_and_immediate() {
        let strategy = SyncStrategy::defaults_for(&OperationType::EmergencyReport);
        assert_eq!(strategy.priority, Priority::Critical);
        assert!(strategy.immediate);
        assert_eq!(strategy.handling, HandlingMode::Individual);
    }

    #[test]
    fn sop_access_batches_ten() {
        let strategy = SyncStrategy::defaults_for(&OperationType::SopAccess);
        assert_eq!(strategy.batch_size, 10);
        assert_eq!(strategy.handling, HandlingMode::Batched);
        assert_eq!(strategy.max_retries, 3);
    }

    #[test]
    fn custom_types_use_fallback_defaults() {
        let strategy = SyncStrategy::defaults_for(&OperationType::from("inventory_count"));
        assert_eq!(strategy.priority, Priority::Medium);
        assert_eq!(strategy.max_retries, DEFAULT_MAX_RETRIES);
        assert!(!strategy.immediate);
    }

    #[test]
    fn batch_size_is_never_zero() {
        let strategy = SyncStrategy::defaults_for(&OperationType::AuditLog).with_batch_size(0);
        assert_eq!(strategy.batch_size, 1);
    }
}
