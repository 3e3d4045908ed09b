use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;

use super::models::{DoctorRow, FollowUpRow, MessageRow, OrganizationRow, PatientRow};
use super::{ConversationStore, StoreError};
use crate::models::{
    Doctor, FollowUp, FollowUpDetails, FollowUpUpdate, Message, NewFollowUp, NewMessage,
    NewPatient, Organization, Patient, PatientDetails, PatientRecord,
};
use crate::scheduler::FollowUpScheduler;

const PATIENT_COLUMNS: &str = "id, doctor_id, name, phone, preferred_contact_method, age, \
     gender, blood_type, known_conditions, allergies, medications, created_at";

const FOLLOW_UP_COLUMNS: &str = "id, patient_id, doctor_id, scheduled_at, completed_at, \
     visit_summary, diagnosis, prescription, doctor_notes, notes, critical_flag, created_at";

const MESSAGE_COLUMNS: &str =
    "id, patient_id, doctor_id, direction, channel, content, status, created_at";

const ACTIVE_FOLLOW_UP_INDEX: &str = "uniq_follow_ups_active_patient";

/// Unique-constraint violation reported by Postgres, with the constraint name.
fn unique_violation(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

/// Conversation store backed by Postgres
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn doctor_with_org(
        conn: &mut PgConnection,
        doctor_id: Uuid,
    ) -> Result<(Doctor, Organization), StoreError> {
        let doctor: DoctorRow =
            sqlx::query_as("SELECT id, organization_id, name, email FROM doctors WHERE id = $1")
                .bind(doctor_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| StoreError::not_found("Doctor", doctor_id))?;

        let organization: OrganizationRow =
            sqlx::query_as("SELECT id, name FROM organizations WHERE id = $1")
                .bind(doctor.organization_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("doctor {} has no organization", doctor.id))
                })?;

        Ok((doctor.into(), organization.into()))
    }

    async fn insert_follow_up(
        tx: &mut Transaction<'_, Postgres>,
        patient_id: Uuid,
        new: NewFollowUp,
    ) -> Result<FollowUp, StoreError> {
        let row: FollowUpRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO follow_ups (id, patient_id, doctor_id, scheduled_at, visit_summary,
                                    diagnosis, prescription, doctor_notes, notes, critical_flag)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            FOLLOW_UP_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(new.doctor_id)
        .bind(new.scheduled_at)
        .bind(new.visit_summary)
        .bind(new.diagnosis)
        .bind(new.prescription)
        .bind(new.doctor_notes)
        .bind(new.notes)
        .bind(new.critical_flag)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(c) if c == ACTIVE_FOLLOW_UP_INDEX => StoreError::ActiveFollowUpExists(patient_id),
            _ => StoreError::from(e),
        })?;

        Ok(row.into())
    }

    async fn latest_follow_up(
        conn: &mut PgConnection,
        patient_id: Uuid,
    ) -> Result<Option<FollowUp>, StoreError> {
        let row: Option<FollowUpRow> = sqlx::query_as(&format!(
            "SELECT {} FROM follow_ups WHERE patient_id = $1 ORDER BY created_at DESC, seq DESC LIMIT 1",
            FOLLOW_UP_COLUMNS
        ))
        .bind(patient_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(FollowUp::from))
    }

    async fn messages_for(
        conn: &mut PgConnection,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {} FROM messages WHERE patient_id = $1 ORDER BY created_at DESC, seq DESC LIMIT $2",
            MESSAGE_COLUMNS
        ))
        .bind(patient_id)
        .bind(limit as i64)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn create_organization(&self, name: &str) -> Result<Organization, StoreError> {
        let row: OrganizationRow =
            sqlx::query_as("INSERT INTO organizations (id, name) VALUES ($1, $2) RETURNING id, name")
                .bind(Uuid::new_v4())
                .bind(name)
                .fetch_one(&self.pool)
                .await?;

        tracing::info!("✓ Organization created: {}", row.id);
        Ok(row.into())
    }

    async fn create_doctor(
        &self,
        organization_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<Doctor, StoreError> {
        let row: DoctorRow = sqlx::query_as(
            r#"
            INSERT INTO doctors (id, organization_id, name, email)
            VALUES ($1, $2, $3, $4)
            RETURNING id, organization_id, name, email
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                StoreError::not_found("Organization", organization_id)
            }
            e if unique_violation(&e).is_some() => {
                StoreError::Conflict(format!("doctor with email {} already exists", email))
            }
            e => StoreError::from(e),
        })?;

        tracing::info!("✓ Doctor created: {}", row.id);
        Ok(row.into())
    }

    async fn create_patient_with_follow_up(
        &self,
        patient: NewPatient,
        follow_up: NewFollowUp,
        scheduler: &FollowUpScheduler,
    ) -> Result<(Patient, FollowUp), StoreError> {
        let mut tx = self.pool.begin().await?;

        let doctor_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM doctors WHERE id = $1)")
                .bind(patient.doctor_id)
                .fetch_one(&mut *tx)
                .await?;
        if !doctor_exists {
            return Err(StoreError::not_found("Doctor", patient.doctor_id));
        }

        let phone = patient.phone.clone();
        let row: PatientRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO patients (id, doctor_id, name, phone, preferred_contact_method, age,
                                  gender, blood_type, known_conditions, allergies, medications)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            PATIENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(patient.doctor_id)
        .bind(patient.name)
        .bind(patient.phone)
        .bind(patient.preferred_contact_method.as_str())
        .bind(patient.age)
        .bind(patient.gender)
        .bind(patient.blood_type)
        .bind(patient.known_conditions)
        .bind(patient.allergies)
        .bind(patient.medications)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => StoreError::Conflict(format!("patient with phone {} already exists", phone)),
            None => StoreError::from(e),
        })?;
        let patient = Patient::try_from(row)?;

        let follow_up = Self::insert_follow_up(&mut tx, patient.id, follow_up).await?;

        // The job row is written on the same transaction: either the
        // follow-up and its job both commit or neither does.
        scheduler.schedule_follow_up_in(&mut *tx, &follow_up).await?;
        tx.commit().await?;

        tracing::info!(
            patient_id = %patient.id,
            follow_up_id = %follow_up.id,
            "✓ Patient registered"
        );
        Ok((patient, follow_up))
    }

    async fn open_follow_up(
        &self,
        patient_id: Uuid,
        follow_up: NewFollowUp,
        scheduler: &FollowUpScheduler,
    ) -> Result<FollowUp, StoreError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM patients WHERE id = $1 FOR UPDATE")
                .bind(patient_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::not_found("Patient", patient_id));
        }

        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follow_ups WHERE patient_id = $1 AND completed_at IS NULL)",
        )
        .bind(patient_id)
        .fetch_one(&mut *tx)
        .await?;
        if active {
            return Err(StoreError::ActiveFollowUpExists(patient_id));
        }

        let follow_up = Self::insert_follow_up(&mut tx, patient_id, follow_up).await?;
        scheduler.schedule_follow_up_in(&mut *tx, &follow_up).await?;
        tx.commit().await?;

        tracing::info!(
            patient_id = %patient_id,
            follow_up_id = %follow_up.id,
            "✓ Follow-up opened"
        );
        Ok(follow_up)
    }

    async fn find_patient_by_phone(&self, phone: &str) -> Result<Option<PatientRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let row: Option<PatientRow> = sqlx::query_as(&format!(
            "SELECT {} FROM patients WHERE phone = $1",
            PATIENT_COLUMNS
        ))
        .bind(phone)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let patient = Patient::try_from(row)?;
        let (doctor, organization) = Self::doctor_with_org(&mut conn, patient.doctor_id).await?;
        let latest_follow_up = Self::latest_follow_up(&mut conn, patient.id).await?;

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
        let mut conn = self.pool.acquire().await?;

        let row: Option<FollowUpRow> = sqlx::query_as(&format!(
            "SELECT {} FROM follow_ups WHERE id = $1",
            FOLLOW_UP_COLUMNS
        ))
        .bind(follow_up_id)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let follow_up = FollowUp::from(row);

        let patient: PatientRow = sqlx::query_as(&format!(
            "SELECT {} FROM patients WHERE id = $1",
            PATIENT_COLUMNS
        ))
        .bind(follow_up.patient_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::Corrupt(format!("follow-up {} has no patient", follow_up.id)))?;

        let (doctor, organization) = Self::doctor_with_org(&mut conn, follow_up.doctor_id).await?;

        Ok(Some(FollowUpDetails {
            follow_up,
            patient: patient.try_into()?,
            doctor,
            organization,
        }))
    }

    async fn get_patient_details(
        &self,
        patient_id: Uuid,
        message_limit: usize,
    ) -> Result<Option<PatientDetails>, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let row: Option<PatientRow> = sqlx::query_as(&format!(
            "SELECT {} FROM patients WHERE id = $1",
            PATIENT_COLUMNS
        ))
        .bind(patient_id)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let follow_ups: Vec<FollowUpRow> = sqlx::query_as(&format!(
            "SELECT {} FROM follow_ups WHERE patient_id = $1 ORDER BY created_at DESC, seq DESC",
            FOLLOW_UP_COLUMNS
        ))
        .bind(patient_id)
        .fetch_all(&mut *conn)
        .await?;

        let messages = Self::messages_for(&mut conn, patient_id, message_limit).await?;

        Ok(Some(PatientDetails {
            patient: row.try_into()?,
            follow_ups: follow_ups.into_iter().map(FollowUp::from).collect(),
            messages,
        }))
    }

    async fn save_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let row: MessageRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO messages (id, patient_id, doctor_id, direction, channel, content, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(message.patient_id)
        .bind(message.doctor_id)
        .bind(message.direction.as_str())
        .bind(message.channel.as_str())
        .bind(&message.content)
        .bind(message.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                StoreError::not_found("Patient", message.patient_id)
            }
            e => StoreError::from(e),
        })?;

        tracing::debug!(
            message_id = %row.id,
            patient_id = %row.patient_id,
            direction = %row.direction,
            "Message saved"
        );
        row.try_into()
    }

    async fn recent_messages(
        &self,
        patient_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::messages_for(&mut conn, patient_id, limit).await
    }

    async fn complete_follow_up(&self, follow_up_id: Uuid) -> Result<FollowUp, StoreError> {
        let row: Option<FollowUpRow> = sqlx::query_as(&format!(
            "UPDATE follow_ups SET completed_at = COALESCE(completed_at, NOW()) WHERE id = $1 RETURNING {}",
            FOLLOW_UP_COLUMNS
        ))
        .bind(follow_up_id)
        .fetch_optional(&self.pool)
        .await?;

        let follow_up = row
            .map(FollowUp::from)
            .ok_or_else(|| StoreError::not_found("Follow-up", follow_up_id))?;
        tracing::info!(follow_up_id = %follow_up_id, "✓ Follow-up completed");
        Ok(follow_up)
    }

    async fn update_follow_up(
        &self,
        follow_up_id: Uuid,
        changes: FollowUpUpdate,
    ) -> Result<FollowUp, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: FollowUpRow = sqlx::query_as(&format!(
            "SELECT {} FROM follow_ups WHERE id = $1 FOR UPDATE",
            FOLLOW_UP_COLUMNS
        ))
        .bind(follow_up_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("Follow-up", follow_up_id))?;

        let mut follow_up = FollowUp::from(row);
        if !follow_up.is_active() {
            return Err(StoreError::FollowUpCompleted(follow_up_id));
        }
        changes.apply_to(&mut follow_up);

        sqlx::query(
            r#"
            UPDATE follow_ups
            SET visit_summary = $2, diagnosis = $3, prescription = $4,
                doctor_notes = $5, notes = $6, critical_flag = $7
            WHERE id = $1
            "#,
        )
        .bind(follow_up.id)
        .bind(&follow_up.visit_summary)
        .bind(&follow_up.diagnosis)
        .bind(&follow_up.prescription)
        .bind(&follow_up.doctor_notes)
        .bind(&follow_up.notes)
        .bind(follow_up.critical_flag)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(follow_up_id = %follow_up_id, "✓ Follow-up updated");
        Ok(follow_up)
    }
}
