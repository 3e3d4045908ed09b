use std::sync::Arc;
use std::time::Duration;

use super::replies::{HELP_ACKNOWLEDGED, HELP_FALLBACK};
use crate::db::{ConversationStore, StoreError};
use crate::models::{NewMessage, PatientRecord};
use crate::notify::{DoctorNotification, DoctorNotifier, NotificationError};

/// Keywords that route a message to a human instead of the assistant.
/// Matched against the whole message after trimming and lowercasing.
pub const HELP_KEYWORDS: [&str; 3] = ["help", "support", "urgent"];

pub fn is_help_request(body: &str) -> bool {
    let normalized = body.trim().to_lowercase();
    HELP_KEYWORDS.contains(&normalized.as_str())
}

/// Result of running the escalation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    pub reply: String,
    pub doctor_notified: bool,
}

/// Deterministic help path: acknowledge the patient and alert their doctor.
pub struct HelpEscalation {
    store: Arc<dyn ConversationStore>,
    notifier: Arc<dyn DoctorNotifier>,
    notify_timeout: Duration,
}

impl HelpEscalation {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        notifier: Arc<dyn DoctorNotifier>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            notify_timeout,
        }
    }

    /// Save the acknowledgment and notify the doctor. When the
    /// notification cannot be dispatched the patient is pointed to their
    /// provider instead.
    pub async fn escalate(
        &self,
        record: &PatientRecord,
        original_message: &str,
    ) -> Result<Escalation, StoreError> {
        let patient = &record.patient;

        self.store
            .save_message(NewMessage::outbound(
                patient.id,
                patient.doctor_id,
                HELP_ACKNOWLEDGED,
            ))
            .await?;

        let notification = DoctorNotification {
            doctor_email: record.doctor.email.clone(),
            doctor_name: record.doctor.name.clone(),
            patient_name: patient.name.clone(),
            patient_id: patient.id,
            organization_name: record.organization.name.clone(),
            message: original_message.to_string(),
            urgent_flag: true,
        };

        let dispatched =
            match tokio::time::timeout(self.notify_timeout, self.notifier.notify(&notification))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(NotificationError::Timeout(self.notify_timeout.as_secs())),
            };

        match dispatched {
            Ok(()) => {
                tracing::info!(patient_id = %patient.id, "Help request escalated to doctor");
                Ok(Escalation {
                    reply: HELP_ACKNOWLEDGED.to_string(),
                    doctor_notified: true,
                })
            }
            Err(e) => {
                tracing::error!(
                    patient_id = %patient.id,
                    error = %e,
                    "Failed to notify doctor of help request"
                );
                self.store
                    .save_message(NewMessage::outbound(
                        patient.id,
                        patient.doctor_id,
                        HELP_FALLBACK,
                    ))
                    .await?;
                Ok(Escalation {
                    reply: HELP_FALLBACK.to_string(),
                    doctor_notified: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_match_whole_message_case_insensitively() {
        assert!(is_help_request("HELP"));
        assert!(is_help_request("  Support \n"));
        assert!(is_help_request("urgent"));
        assert!(!is_help_request("help me please"));
        assert!(!is_help_request("I need support"));
        assert!(!is_help_request(""));
    }
}
