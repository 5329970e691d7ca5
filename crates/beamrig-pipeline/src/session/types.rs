//! Audit trail kept by every stage session.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Result of an audited stage operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditOutcome {
    Accepted { remark: Option<String> },
    Rejected { reason: String },
}

/// One audited operation on a stage.
///
/// Resets leave the trail in place, so it shows the whole history of
/// a camera's stage across recaptures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Seconds since the Unix epoch.
    pub at: u64,
    pub operation: String,
    pub outcome: AuditOutcome,
}

impl LogEntry {
    pub fn accepted(operation: impl Into<String>) -> Self {
        Self::stamped(operation, AuditOutcome::Accepted { remark: None })
    }

    pub fn accepted_with(operation: impl Into<String>, remark: impl Into<String>) -> Self {
        Self::stamped(
            operation,
            AuditOutcome::Accepted {
                remark: Some(remark.into()),
            },
        )
    }

    pub fn rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::stamped(
            operation,
            AuditOutcome::Rejected {
                reason: reason.into(),
            },
        )
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Rejected { .. })
    }

    fn stamped(operation: impl Into<String>, outcome: AuditOutcome) -> Self {
        Self {
            at: current_timestamp(),
            operation: operation.into(),
            outcome,
        }
    }
}

/// Current Unix timestamp in seconds; zero if the clock is before the epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
