use thiserror::Error;

/// Reasons an engine operation refuses a transition.
///
/// Every variant leaves the affected entity exactly as it was before the
/// attempt; callers surface the message and may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RigError {
    /// A required field is missing or invalid.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A gating predicate is false for the requested action.
    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),
    /// The backend call underlying a transition failed or timed out.
    #[error("remote operation failed: {0}")]
    RemoteOperation(String),
    /// Rectangle coordinates are out of range or not numbers.
    #[error("invalid ROI: {0}")]
    InvalidRoi(String),
}

impl RigError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionNotMet(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteOperation(msg.into())
    }

    pub fn invalid_roi(msg: impl Into<String>) -> Self {
        Self::InvalidRoi(msg.into())
    }
}

pub type RigResult<T> = Result<T, RigError>;

/// Reject a missing or non-positive numeric field.
pub fn require_positive(field: &str, value: Option<f64>) -> RigResult<f64> {
    match value {
        None => Err(RigError::validation(format!("{field} is required"))),
        Some(v) if !v.is_finite() || v <= 0.0 => Err(RigError::validation(format!(
            "{field} must be positive and finite (got {v})"
        ))),
        Some(v) => Ok(v),
    }
}

/// Reject a present but non-positive or non-finite numeric field; `None` passes.
pub fn reject_non_positive(field: &str, value: Option<f64>) -> RigResult<()> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(RigError::validation(format!(
            "{field} must be positive and finite (got {v})"
        ))),
        _ => Ok(()),
    }
}
