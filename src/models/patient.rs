use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FollowUp, Message};

/// Organization a doctor belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
}

/// Doctor owning patients and receiving escalations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreferredContactMethod {
    #[default]
    Whatsapp,
    Sms,
    Email,
}

impl PreferredContactMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "WHATSAPP",
            Self::Sms => "SMS",
            Self::Email => "EMAIL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "WHATSAPP" => Some(Self::Whatsapp),
            "SMS" => Some(Self::Sms),
            "EMAIL" => Some(Self::Email),
            _ => None,
        }
    }
}

/// Patient resource. The owning doctor never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub phone: String,
    pub preferred_contact_method: PreferredContactMethod,
    pub age: i32,
    pub gender: String,
    pub blood_type: String,
    pub known_conditions: Vec<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// First word of the patient's name, used in greetings.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Registration payload for a new patient
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub doctor_id: Uuid,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub preferred_contact_method: PreferredContactMethod,
    pub age: i32,
    pub gender: String,
    pub blood_type: String,
    #[serde(default)]
    pub known_conditions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
}

/// Everything the webhook needs about a sender, resolved from their phone.
#[derive(Debug, Clone)]
pub struct PatientRecord {
    pub patient: Patient,
    pub doctor: Doctor,
    pub organization: Organization,
    /// Most recently created follow-up, completed or not.
    pub latest_follow_up: Option<FollowUp>,
}

impl PatientRecord {
    /// The latest follow-up when it is still open.
    pub fn active_follow_up(&self) -> Option<&FollowUp> {
        self.latest_follow_up.as_ref().filter(|f| f.is_active())
    }

    pub fn latest_is_completed(&self) -> bool {
        self.latest_follow_up
            .as_ref()
            .map(|f| !f.is_active())
            .unwrap_or(false)
    }
}

/// Patient view returned by `GET /patients/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetails {
    pub patient: Patient,
    pub follow_ups: Vec<FollowUp>,
    pub messages: Vec<Message>,
}
