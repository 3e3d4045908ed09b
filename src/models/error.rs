use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body for every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
}

impl ErrorBody {
    /// Create a new error body
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Input rejected before any side effect takes place
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required fields: From or Body")]
    MissingWebhookFields,

    #[error("Doctor ID must match between patient and follow-up")]
    DoctorMismatch,

    #[error("Field '{field}' {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("No fields to update")]
    EmptyUpdate,
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
