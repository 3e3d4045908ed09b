//! Doctor notifications. Best-effort: failures are reported to the caller
//! but must never change what the patient is told, except on the help path
//! where a failed dispatch selects the fallback reply.

pub mod email;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use email::{EmailNotifier, MailConfig};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Mail relay unreachable: {0}")]
    Unreachable(String),

    #[error("Mail relay rejected notification (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Notification timed out after {0}s")]
    Timeout(u64),
}

/// Alert sent to a doctor about one of their patients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorNotification {
    pub doctor_email: String,
    pub doctor_name: String,
    pub patient_name: String,
    pub patient_id: Uuid,
    pub organization_name: String,
    /// The patient's message that triggered the alert.
    pub message: String,
    pub urgent_flag: bool,
}

#[async_trait]
pub trait DoctorNotifier: Send + Sync {
    async fn notify(&self, notification: &DoctorNotification) -> Result<(), NotificationError>;
}
