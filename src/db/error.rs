use thiserror::Error;
use uuid::Uuid;

use crate::scheduler::SchedulingError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Patient {0} already has an active follow-up")]
    ActiveFollowUpExists(Uuid),

    #[error("Follow-up {0} is completed and can no longer be changed")]
    FollowUpCompleted(Uuid),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Scheduling failed: {0}")]
    Scheduling(#[from] SchedulingError),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
