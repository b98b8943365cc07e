//! Queued operation model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of write carried by an operation.
///
/// The six built-in kinds have default strategies; any other tag is carried
/// as [`OperationType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    EmergencyReport,
    FormSubmission,
    TrainingProgress,
    AuditLog,
    ShiftAction,
    SopAccess,
    Custom(String),
}

impl OperationType {
    /// The built-in types, in no particular order.
    pub const BUILT_IN: [OperationType; 6] = [
        OperationType::EmergencyReport,
        OperationType::FormSubmission,
        OperationType::TrainingProgress,
        OperationType::AuditLog,
        OperationType::ShiftAction,
        OperationType::SopAccess,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::EmergencyReport => "emergency_report",
            Self::FormSubmission => "form_submission",
            Self::TrainingProgress => "training_progress",
            Self::AuditLog => "audit_log",
            Self::ShiftAction => "shift_action",
            Self::SopAccess => "sop_access",
            Self::Custom(tag) => tag,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl From<&str> for OperationType {
    fn from(value: &str) -> Self {
        match value {
            "emergency_report" => Self::EmergencyReport,
            "form_submission" => Self::FormSubmission,
            "training_progress" => Self::TrainingProgress,
            "audit_log" => Self::AuditLog,
            "shift_action" => Self::ShiftAction,
            "sop_access" => Self::SopAccess,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for OperationType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<OperationType> for String {
    fn from(value: OperationType) -> Self {
        match value {
            OperationType::Custom(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority. Declaration order is urgency order, so sorting
/// ascending puts `Critical` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

crate::impl_domain_status_conversions!(Priority {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

crate::impl_domain_status_conversions!(OperationStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

impl OperationStatus {
    /// Completed and failed rows only leave their state through an explicit
    /// retry of failed work or retention purge.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Who produced the operation. Carried to the server, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerContext {
    pub device_id: Option<String>,
    pub user_id: Option<String>,
    pub restaurant_id: Option<String>,
}

/// One durable unit of work awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub op_type: OperationType,
    pub priority: Priority,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub status: OperationStatus,
    pub network_required: bool,
    pub dependencies: Vec<String>,
    pub owner: OwnerContext,
    pub last_error: Option<String>,
}

impl Operation {
    /// Not scheduled for later, or the scheduled time has arrived.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.map_or(true, |at| at <= now)
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Timestamp used for retention: the last attempt, falling back to the
    /// last persisted transition.
    pub fn retention_anchor(&self) -> DateTime<Utc> {
        self.last_attempt.unwrap_or(self.updated_at)
    }
}
