use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Doctor, Organization, Patient};

/// One clinical follow-up episode. `completed_at == None` means active;
/// completion is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
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

impl FollowUp {
    pub fn is_active(&self) -> bool {
        self.completed_at.is_none()
    }
}

/// Follow-up fields supplied at creation time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFollowUp {
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub visit_summary: String,
    pub diagnosis: String,
    pub prescription: String,
    #[serde(default)]
    pub doctor_notes: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub critical_flag: bool,
}

impl NewFollowUp {
    /// Follow-up opened on behalf of a patient who asked for help after
    /// their previous episode was closed.
    pub fn help_request(doctor_id: Uuid, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            doctor_id,
            scheduled_at,
            visit_summary: "General check-in follow-up".to_string(),
            diagnosis: "Follow-up consultation".to_string(),
            prescription: "As previously prescribed".to_string(),
            doctor_notes: "Patient requested continued support".to_string(),
            notes: "Automated follow-up created from help request".to_string(),
            critical_flag: false,
        }
    }
}

/// Partial edit of a follow-up's clinical context (PATCH semantics)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpUpdate {
    pub visit_summary: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub doctor_notes: Option<String>,
    pub notes: Option<String>,
    pub critical_flag: Option<bool>,
}

impl FollowUpUpdate {
    pub fn is_empty(&self) -> bool {
        self.visit_summary.is_none()
            && self.diagnosis.is_none()
            && self.prescription.is_none()
            && self.doctor_notes.is_none()
            && self.notes.is_none()
            && self.critical_flag.is_none()
    }

    /// Apply the provided fields onto an existing follow-up.
    pub fn apply_to(self, follow_up: &mut FollowUp) {
        if let Some(v) = self.visit_summary {
            follow_up.visit_summary = v;
        }
        if let Some(v) = self.diagnosis {
            follow_up.diagnosis = v;
        }
        if let Some(v) = self.prescription {
            follow_up.prescription = v;
        }
        if let Some(v) = self.doctor_notes {
            follow_up.doctor_notes = v;
        }
        if let Some(v) = self.notes {
            follow_up.notes = v;
        }
        if let Some(v) = self.critical_flag {
            follow_up.critical_flag = v;
        }
    }
}

/// A follow-up together with the people it concerns, loaded fresh when a
/// scheduled job fires.
#[derive(Debug, Clone)]
pub struct FollowUpDetails {
    pub follow_up: FollowUp,
    pub patient: Patient,
    pub doctor: Doctor,
    pub organization: Organization,
}
