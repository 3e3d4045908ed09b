use async_trait::async_trait;
use uuid::Uuid;

use super::StoreError;
use crate::models::{
    Doctor, FollowUp, FollowUpDetails, FollowUpUpdate, Message, NewFollowUp, NewMessage,
    NewPatient, Organization, Patient, PatientDetails, PatientRecord,
};
use crate::scheduler::FollowUpScheduler;

/// Conversation state shared by the scheduler and the webhook processor.
///
/// Creation of a follow-up and the scheduling of its first message are one
/// unit: if the job cannot be enqueued the follow-up is not kept.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_organization(&self, name: &str) -> Result<Organization, StoreError>;

    async fn create_doctor(
        &self,
        organization_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Doctor, StoreError>;

    /// Register a patient with their first follow-up.
    async fn create_patient_with_follow_up(
        &self,
        patient: NewPatient,
        follow_up: NewFollowUp,
        scheduler: &FollowUpScheduler,
    ) -> Result<(Patient, FollowUp), StoreError>;

    /// Open another follow-up for an existing patient. Fails with
    /// `ActiveFollowUpExists` while one is still open.
    async fn open_follow_up(
        &self,
        patient_id: Uuid,
        follow_up: NewFollowUp,
        scheduler: &FollowUpScheduler,
    ) -> Result<FollowUp, StoreError>;

    async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<PatientRecord>, StoreError>;

    async fn load_follow_up_details(
        &self,
        follow_up_id: Uuid,
    ) -> Result<Option<FollowUpDetails>, StoreError>;

    async fn get_patient_details(
        &self,
        patient_id: Uuid,
        message_limit: usize,
    ) -> Result<Option<PatientDetails>, StoreError>;

    async fn save_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Most recent messages first.
    async fn recent_messages(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;

    /// Mark a follow-up completed. Completing twice is a no-op and keeps
    /// the first timestamp.
    async fn complete_follow_up(&self, follow_up_id: Uuid) -> Result<FollowUp, StoreError>;

    async fn update_follow_up(
        &self,
        follow_up_id: Uuid,
        changes: FollowUpUpdate,
    ) -> Result<FollowUp, StoreError>;
}
