use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ConversationStore, StoreError};
use crate::models::{
    Doctor, FollowUp, FollowUpDetails, FollowUpUpdate, Message, NewFollowUp, NewMessage,
    NewPatient, Organization, Patient, PatientDetails, PatientRecord,
};
use crate::scheduler::FollowUpScheduler;

#[derive(Default)]
struct State {
    organizations: HashMap<Uuid, Organization>,
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    /// Insertion order doubles as creation order.
    follow_ups: Vec<FollowUp>,
    messages: Vec<Message>,
}

impl State {
    fn doctor_with_org(&self, doctor_id: Uuid) -> Result<(Doctor, Organization), StoreError> {
        let doctor = self
            .doctors
            .get(&doctor_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Doctor", doctor_id))?;
        let organization = self
            .organizations
            .get(&doctor.organization_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::Corrupt(format!("doctor {} has no organization", doctor.id))
            })?;
        Ok((doctor, organization))
    }

    fn latest_follow_up(&self, patient_id: Uuid) -> Option<&FollowUp> {
        self.follow_ups
            .iter()
            .rev()
            .find(|f| f.patient_id == patient_id)
    }

    fn has_active_follow_up(&self, patient_id: Uuid) -> bool {
        self.follow_ups
            .iter()
            .any(|f| f.patient_id == patient_id && f.is_active())
    }

    fn follow_up_mut(&mut self, id: Uuid) -> Result<&mut FollowUp, StoreError> {
        self.follow_ups
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::not_found("Follow-up", id))
    }

    fn recent_messages(&self, patient_id: Uuid, limit: usize) -> Vec<Message> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.patient_id == patient_id)
            .take(limit)
            .cloned()
            .collect()
    }
}

fn build_follow_up(patient_id: Uuid, new: NewFollowUp) -> FollowUp {
    FollowUp {
        id: Uuid::new_v4(),
        patient_id,
        doctor_id: new.doctor_id,
        scheduled_at: new.scheduled_at,
        completed_at: None,
        visit_summary: new.visit_summary,
        diagnosis: new.diagnosis,
        prescription: new.prescription,
        doctor_notes: new.doctor_notes,
        notes: new.notes,
        critical_flag: new.critical_flag,
        created_at: Utc::now(),
    }
}

/// In-process conversation store with the same contracts as the Postgres
/// one. The state lock is held across scheduling so that a failed enqueue
/// leaves nothing behind.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn message_count(&self, patient_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.patient_id == patient_id)
            .count()
    }

    pub async fn follow_ups_for(&self, patient_id: Uuid) -> Vec<FollowUp> {
        self.state
            .lock()
            .await
            .follow_ups
            .iter()
            .filter(|f| f.patient_id == patient_id)
            .cloned()
            .collect()
    }

    pub async fn total_messages(&self) -> usize {
        self.state.lock().await.messages.len()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_organization(&self, name: &str) -> Result<Organization, StoreError> {
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.state
            .lock()
            .await
            .organizations
            .insert(org.id, org.clone());
        Ok(org)
    }

    async fn create_doctor(
        &self,
        organization_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Doctor, StoreError> {
        let mut state = self.state.lock().await;
        if !state.organizations.contains_key(&organization_id) {
            return Err(StoreError::not_found("Organization", organization_id));
        }
        if state.doctors.values().any(|d| d.email == email) {
            return Err(StoreError::Conflict(format!(
                "doctor with email {} already exists",
                email
            )));
        }

        let doctor = Doctor {
            id: Uuid::new_v4(),
            organization_id,
            name: name.to_string(),
            email: email.to_string(),
        };
        state.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn create_patient_with_follow_up(
        &self,
        patient: NewPatient,
        follow_up: NewFollowUp,
        scheduler: &FollowUpScheduler,
    ) -> Result<(Patient, FollowUp), StoreError> {
        let mut state = self.state.lock().await;
        if !state.doctors.contains_key(&patient.doctor_id) {
            return Err(StoreError::not_found("Doctor", patient.doctor_id));
        }
        if state.patients.values().any(|p| p.phone == patient.phone) {
            return Err(StoreError::Conflict(format!(
                "patient with phone {} already exists",
                patient.phone
            )));
        }

        let patient = Patient {
            id: Uuid::new_v4(),
            doctor_id: patient.doctor_id,
            name: patient.name,
            phone: patient.phone,
            preferred_contact_method: patient.preferred_contact_method,
            age: patient.age,
            gender: patient.gender,
            blood_type: patient.blood_type,
            known_conditions: patient.known_conditions,
            allergies: patient.allergies,
            medications: patient.medications,
            created_at: Utc::now(),
        };
        let follow_up = build_follow_up(patient.id, follow_up);

        scheduler.schedule_follow_up(&follow_up).await?;

        state.patients.insert(patient.id, patient.clone());
        state.follow_ups.push(follow_up.clone());
        Ok((patient, follow_up))
    }

    async fn open_follow_up(
        &self,
        patient_id: Uuid,
        follow_up: NewFollowUp,
        scheduler: &FollowUpScheduler,
    ) -> Result<FollowUp, StoreError> {
        let mut state = self.state.lock().await;
        if !state.patients.contains_key(&patient_id) {
            return Err(StoreError::not_found("Patient", patient_id));
        }
        if state.has_active_follow_up(patient_id) {
            return Err(StoreError::ActiveFollowUpExists(patient_id));
        }

        let follow_up = build_follow_up(patient_id, follow_up);
        scheduler.schedule_follow_up(&follow_up).await?;

        state.follow_ups.push(follow_up.clone());
        Ok(follow_up)
    }

    async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<PatientRecord>, StoreError> {
        let state = self.state.lock().await;
        let Some(patient) = state.patients.values().find(|p| p.phone == phone).cloned() else {
            return Ok(None);
        };

        let (doctor, organization) = state.doctor_with_org(patient.doctor_id)?;
        let latest_follow_up = state.latest_follow_up(patient.id).cloned();

        Ok(Some(PatientRecord {
            patient,
            doctor,
            organization,
            latest_follow_up,
        }))
    }

    async fn load_follow_up_details(
        &self,
        follow_up_id: Uuid,
    ) -> Result<Option<FollowUpDetails>, StoreError> {
        let state = self.state.lock().await;
        let Some(follow_up) = state.follow_ups.iter().find(|f| f.id == follow_up_id).cloned()
        else {
            return Ok(None);
        };

        let patient = state
            .patients
            .get(&follow_up.patient_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::Corrupt(format!("follow-up {} has no patient", follow_up.id))
            })?;
        let (doctor, organization) = state.doctor_with_org(follow_up.doctor_id)?;

        Ok(Some(FollowUpDetails {
            follow_up,
            patient,
            doctor,
            organization,
        }))
    }

    async fn get_patient_details(
        &self,
        patient_id: Uuid,
        message_limit: usize,
    ) -> Result<Option<PatientDetails>, StoreError> {
        let state = self.state.lock().await;
        let Some(patient) = state.patients.get(&patient_id).cloned() else {
            return Ok(None);
        };

        let follow_ups = state
            .follow_ups
            .iter()
            .rev()
            .filter(|f| f.patient_id == patient_id)
            .cloned()
            .collect();
        let messages = state.recent_messages(patient_id, message_limit);

        Ok(Some(PatientDetails {
            patient,
            follow_ups,
            messages,
        }))
    }

    async fn save_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let mut state = self.state.lock().await;
        if !state.patients.contains_key(&message.patient_id) {
            return Err(StoreError::not_found("Patient", message.patient_id));
        }

        let saved = Message {
            id: Uuid::new_v4(),
            patient_id: message.patient_id,
            doctor_id: message.doctor_id,
            direction: message.direction,
            channel: message.channel,
            content: message.content,
            status: message.status,
            created_at: Utc::now(),
        };
        state.messages.push(saved.clone());
        Ok(saved)
    }

    async fn recent_messages(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(self.state.lock().await.recent_messages(patient_id, limit))
    }

    async fn complete_follow_up(&self, follow_up_id: Uuid) -> Result<FollowUp, StoreError> {
        let mut state = self.state.lock().await;
        let follow_up = state.follow_up_mut(follow_up_id)?;
        if follow_up.completed_at.is_none() {
            follow_up.completed_at = Some(Utc::now());
        }
        Ok(follow_up.clone())
    }

    async fn update_follow_up(
        &self,
        follow_up_id: Uuid,
        changes: FollowUpUpdate,
    ) -> Result<FollowUp, StoreError> {
        let mut state = self.state.lock().await;
        let follow_up = state.follow_up_mut(follow_up_id)?;
        if !follow_up.is_active() {
            return Err(StoreError::FollowUpCompleted(follow_up_id));
        }
        changes.apply_to(follow_up);
        Ok(follow_up.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, PreferredContactMethod};
    use crate::scheduler::MemoryJobQueue;
    use std::sync::Arc;

    async fn seeded() -> (MemoryStore, Doctor) {
        let store = MemoryStore::new();
        let org = store.create_organization("Riverside Clinic").await.unwrap();
        let doctor = store
            .create_doctor(org.id, "Okafor", "okafor@example.org")
            .await
            .unwrap();
        (store, doctor)
    }

    fn new_patient(doctor_id: Uuid, phone: &str) -> NewPatient {
        NewPatient {
            doctor_id,
            name: "Maria Lopez".into(),
            phone: phone.into(),
            preferred_contact_method: PreferredContactMethod::Whatsapp,
            age: 52,
            gender: "female".into(),
            blood_type: "A+".into(),
            known_conditions: vec![],
            allergies: vec![],
            medications: vec![],
        }
    }

    fn new_follow_up(doctor_id: Uuid) -> NewFollowUp {
        NewFollowUp {
            doctor_id,
            scheduled_at: Utc::now(),
            visit_summary: "blood pressure review".into(),
            diagnosis: "hypertension".into(),
            prescription: "amlodipine".into(),
            doctor_notes: String::new(),
            notes: String::new(),
            critical_flag: false,
        }
    }

    fn scheduler() -> FollowUpScheduler {
        FollowUpScheduler::new(Arc::new(MemoryJobQueue::default()))
    }

    #[tokio::test]
    async fn registration_schedules_first_follow_up() {
        let (store, doctor) = seeded().await;
        let queue = Arc::new(MemoryJobQueue::default());
        let scheduler = FollowUpScheduler::new(queue.clone());

        let (patient, follow_up) = store
            .create_patient_with_follow_up(
                new_patient(doctor.id, "+15551234567"),
                new_follow_up(doctor.id),
                &scheduler,
            )
            .await
            .unwrap();

        assert_eq!(follow_up.patient_id, patient.id);
        assert!(queue.job_for(follow_up.id).is_some());
    }

    #[tokio::test]
    async fn duplicate_phone_is_a_conflict() {
        let (store, doctor) = seeded().await;
        let scheduler = scheduler();
        store
            .create_patient_with_follow_up(
                new_patient(doctor.id, "+15551234567"),
                new_follow_up(doctor.id),
                &scheduler,
            )
            .await
            .unwrap();

        let err = store
            .create_patient_with_follow_up(
                new_patient(doctor.id, "+15551234567"),
                new_follow_up(doctor.id),
                &scheduler,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn second_active_follow_up_is_refused() {
        let (store, doctor) = seeded().await;
        let scheduler = scheduler();
        let (patient, first) = store
            .create_patient_with_follow_up(
                new_patient(doctor.id, "+15551234567"),
                new_follow_up(doctor.id),
                &scheduler,
            )
            .await
            .unwrap();

        let err = store
            .open_follow_up(patient.id, new_follow_up(doctor.id), &scheduler)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ActiveFollowUpExists(id) if id == patient.id));

        store.complete_follow_up(first.id).await.unwrap();
        let second = store
            .open_follow_up(patient.id, new_follow_up(doctor.id), &scheduler)
            .await
            .unwrap();

        let record = store
            .find_patient_by_phone("+15551234567")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.latest_follow_up.map(|f| f.id), Some(second.id));
    }

    #[tokio::test]
    async fn completion_is_idempotent_and_keeps_first_timestamp() {
        let (store, doctor) = seeded().await;
        let (_, follow_up) = store
            .create_patient_with_follow_up(
                new_patient(doctor.id, "+15551234567"),
                new_follow_up(doctor.id),
                &scheduler(),
            )
            .await
            .unwrap();

        let first = store.complete_follow_up(follow_up.id).await.unwrap();
        let second = store.complete_follow_up(follow_up.id).await.unwrap();
        assert!(first.completed_at.is_some());
        assert_eq!(first.completed_at, second.completed_at);
    }

    #[tokio::test]
    async fn completed_follow_up_cannot_be_edited() {
        let (store, doctor) = seeded().await;
        let (_, follow_up) = store
            .create_patient_with_follow_up(
                new_patient(doctor.id, "+15551234567"),
                new_follow_up(doctor.id),
                &scheduler(),
            )
            .await
            .unwrap();
        store.complete_follow_up(follow_up.id).await.unwrap();

        let err = store
            .update_follow_up(
                follow_up.id,
                FollowUpUpdate {
                    notes: Some("late note".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::FollowUpCompleted(_)));
    }

    #[tokio::test]
    async fn recent_messages_are_newest_first_and_limited() {
        let (store, doctor) = seeded().await;
        let (patient, _) = store
            .create_patient_with_follow_up(
                new_patient(doctor.id, "+15551234567"),
                new_follow_up(doctor.id),
                &scheduler(),
            )
            .await
            .unwrap();

        for i in 0..10 {
            store
                .save_message(NewMessage::inbound(patient.id, doctor.id, format!("m{}", i)))
                .await
                .unwrap();
        }
        store
            .save_message(NewMessage::outbound(patient.id, doctor.id, "reply"))
            .await
            .unwrap();

        let recent = store.recent_messages(patient.id, 8).await.unwrap();
        assert_eq!(recent.len(), 8);
        assert_eq!(recent[0].content, "reply");
        assert_eq!(recent[0].direction, Direction::Outbound);
        assert_eq!(recent[1].content, "m9");
    }

    #[tokio::test]
    async fn unknown_phone_finds_nothing() {
        let (store, _) = seeded().await;
        assert!(store
            .find_patient_by_phone("+19999999999")
            .await
            .unwrap()
            .is_none());
    }
}
