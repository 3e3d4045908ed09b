use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiError;
use crate::models::{
    FollowUp, FollowUpUpdate, NewFollowUp, NewPatient, Patient, PatientDetails, ValidationError,
};
use crate::AppState;

/// Messages included in the patient details view
const DETAIL_MESSAGE_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPatientRequest {
    pub patient: NewPatient,
    pub follow_up: NewFollowUp,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPatient {
    pub patient: Patient,
    pub follow_up: FollowUp,
}

impl RegisterPatientRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.patient.doctor_id != self.follow_up.doctor_id {
            return Err(ValidationError::DoctorMismatch);
        }
        if self.patient.name.trim().is_empty() {
            return Err(ValidationError::invalid("name", "must not be empty"));
        }
        if self.patient.phone.trim().is_empty() {
            return Err(ValidationError::invalid("phone", "must not be empty"));
        }
        if !(0..=150).contains(&self.patient.age) {
            return Err(ValidationError::invalid("age", "must be between 0 and 150"));
        }
        if self.follow_up.visit_summary.trim().is_empty() {
            return Err(ValidationError::invalid("visitSummary", "must not be empty"));
        }
        Ok(())
    }
}

/// POST /patients
/// Register a patient together with their first follow-up
pub async fn create_patient(
    State(state): State<AppState>,
    Json(mut request): Json<RegisterPatientRequest>,
) -> Result<(StatusCode, Json<RegisteredPatient>), ApiError> {
    request.validate()?;
    request.patient.phone = request.patient.phone.trim().to_string();

    let (patient, follow_up) = state
        .store
        .create_patient_with_follow_up(request.patient, request.follow_up, &state.scheduler)
        .await?;

    tracing::info!("✓ Patient created: {}", patient.id);
    Ok((
        StatusCode::CREATED,
        Json(RegisteredPatient { patient, follow_up }),
    ))
}

/// GET /patients/:id
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientDetails>, ApiError> {
    state
        .store
        .get_patient_details(id, DETAIL_MESSAGE_LIMIT)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Patient with ID {} not found", id)))
}

/// PATCH /follow-ups/:id
/// Edit the clinical context of a follow-up that is still active
pub async fn update_follow_up(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<FollowUpUpdate>,
) -> Result<Json<FollowUp>, ApiError> {
    if changes.is_empty() {
        return Err(ValidationError::EmptyUpdate.into());
    }

    let updated = state.store.update_follow_up(id, changes).await?;
    tracing::info!("✓ Follow-up updated: {}", id);
    Ok(Json(updated))
}
