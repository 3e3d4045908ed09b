use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::db::StoreError;
use crate::models::{ErrorBody, ValidationError};
use crate::scheduler::SchedulingError;

/// Error response with a `{status: "error", message}` body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::error(message),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<SchedulingError> for ApiError {
    fn from(e: SchedulingError) -> Self {
        tracing::error!(error = %e, "Scheduling failed");
        Self::unavailable(format!("Could not schedule follow-up: {}", e))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => Self::not_found(e.to_string()),
            StoreError::Conflict(_)
            | StoreError::ActiveFollowUpExists(_)
            | StoreError::FollowUpCompleted(_) => Self::conflict(e.to_string()),
            StoreError::Scheduling(inner) => inner.into(),
            StoreError::Database(_) | StoreError::Corrupt(_) => {
                tracing::error!(error = %e, "Store error");
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::not_found("Patient", Uuid::nil()), StatusCode::NOT_FOUND),
            (StoreError::ActiveFollowUpExists(Uuid::nil()), StatusCode::CONFLICT),
            (StoreError::FollowUpCompleted(Uuid::nil()), StatusCode::CONFLICT),
            (
                StoreError::Scheduling(SchedulingError::Unavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (StoreError::Corrupt("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = ApiError::from(ValidationError::MissingWebhookFields);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.status, "error");
        assert_eq!(err.body.message, "Missing required fields: From or Body");
    }
}
