use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::StoreError;
use crate::models::{
    Doctor, FollowUp, Message, Organization, Patient, PreferredContactMethod,
};

#[derive(Debug, Clone, FromRow)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub name: String,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DoctorRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<DoctorRow> for Doctor {
    fn from(row: DoctorRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            name: row.name,
            email: row.email,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PatientRow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub phone: String,
    pub preferred_contact_method: String,
    pub age: i32,
    pub gender: String,
    pub blood_type: String,
    pub known_conditions: Vec<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PatientRow> for Patient {
    type Error = StoreError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let preferred_contact_method = PreferredContactMethod::parse(&row.preferred_contact_method)
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "patient {} has contact method '{}'",
                    row.id, row.preferred_contact_method
                ))
            })?;

        Ok(Self {
            id: row.id,
            doctor_id: row.doctor_id,
            name: row.name,
            phone: row.phone,
            preferred_contact_method,
            age: row.age,
            gender: row.gender,
            blood_type: row.blood_type,
            known_conditions: row.known_conditions,
            allergies: row.allergies,
            medications: row.medications,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FollowUpRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub visit_summary: String,
    pub diagnosis: String,
    pub prescription: String,
    pub doctor_notes: String,
    pub notes: String,
    pub critical_flag: bool,
    pub created_at: DateTime<Utc>,
}

impl From<FollowUpRow> for FollowUp {
    fn from(row: FollowUpRow) -> Self {
        Self {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            scheduled_at: row.scheduled_at,
            completed_at: row.completed_at,
            visit_summary: row.visit_summary,
            diagnosis: row.diagnosis,
            prescription: row.prescription,
            doctor_notes: row.doctor_notes,
            notes: row.notes,
            critical_flag: row.critical_flag,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub direction: String,
    pub channel: String,
    pub content: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            direction: row.direction.parse().map_err(StoreError::Corrupt)?,
            channel: row.channel.parse().map_err(StoreError::Corrupt)?,
            content: row.content,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            created_at: row.created_at,
        })
    }
}

/// Row of the `scheduled_jobs` delay queue
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub payload: serde_json::Value,
    pub attempts: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, MessageStatus};

    fn message_row(direction: &str) -> MessageRow {
        MessageRow {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            direction: direction.into(),
            channel: "WHATSAPP".into(),
            content: "hello".into(),
            status: "SENT".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn message_row_converts_text_columns() {
        let msg = Message::try_from(message_row("OUTBOUND")).unwrap();
        assert_eq!(msg.direction, Direction::Outbound);
        assert_eq!(msg.status, MessageStatus::Sent);
    }

    #[test]
    fn unknown_direction_is_corrupt() {
        let err = Message::try_from(message_row("SIDEWAYS")).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
