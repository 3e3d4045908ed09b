use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = Uuid;

/// Payload of a "send follow-up" job. Only identifiers travel with the
/// job; clinical content is re-read from the store when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub follow_up_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at_iso: String,
    pub fire_delay_ms: u64,
}

impl ScheduledJob {
    pub fn new(
        follow_up_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        scheduled_at: DateTime<Utc>,
        fire_delay_ms: u64,
    ) -> Self {
        Self {
            follow_up_id,
            patient_id,
            doctor_id,
            scheduled_at_iso: scheduled_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            fire_delay_ms,
        }
    }

    /// Queue key; one pending job per follow-up.
    pub fn key(&self) -> String {
        self.follow_up_id.to_string()
    }
}

/// A job claimed by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedJob {
    pub id: JobId,
    pub job: ScheduledJob,
    /// Number of times this job has been claimed, including this one.
    pub attempts: u32,
}
