//! Follow-up scheduling: a delay queue of "send follow-up" jobs and the
//! worker that fires them.

pub mod greeting;
pub mod job;
pub mod memory;
pub mod queue;
pub mod worker;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub use greeting::{compose_follow_up_message, greeting_for_hour};
pub use job::{JobId, ReservedJob, ScheduledJob};
pub use memory::MemoryJobQueue;
pub use queue::{
    ConsumeOutcome, JobError, JobHandler, JobQueue, RetryOutcome, RetryPolicy, SchedulingError,
};
pub use worker::{Delivery, FollowUpWorker};

use crate::models::FollowUp;

/// Time left until `scheduled_at`. Past timestamps fire immediately.
pub fn fire_delay(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (scheduled_at - now).to_std().unwrap_or(Duration::ZERO)
}

#[derive(Clone)]
pub struct FollowUpScheduler {
    queue: Arc<dyn JobQueue>,
}

impl FollowUpScheduler {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> Arc<dyn JobQueue> {
        Arc::clone(&self.queue)
    }

    /// Enqueue the job that sends a follow-up's first message at
    /// `scheduled_at`.
    pub async fn schedule(
        &self,
        follow_up_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<JobId, SchedulingError> {
        let (job, delay) = job_for(follow_up_id, patient_id, doctor_id, scheduled_at);
        let id = self.queue.enqueue(job, delay).await?;
        log_scheduled(follow_up_id, id, delay);
        Ok(id)
    }

    pub async fn schedule_follow_up(&self, follow_up: &FollowUp) -> Result<JobId, SchedulingError> {
        self.schedule(
            follow_up.id,
            follow_up.patient_id,
            follow_up.doctor_id,
            follow_up.scheduled_at,
        )
        .await
    }

    /// Like [`schedule_follow_up`](Self::schedule_follow_up), but the job is
    /// written on `conn`, inside the transaction that created the follow-up.
    /// Nothing can fire before that transaction commits.
    pub async fn schedule_follow_up_in(
        &self,
        conn: &mut PgConnection,
        follow_up: &FollowUp,
    ) -> Result<JobId, SchedulingError> {
        let (job, delay) = job_for(
            follow_up.id,
            follow_up.patient_id,
            follow_up.doctor_id,
            follow_up.scheduled_at,
        );
        let id = self.queue.enqueue_in(conn, job, delay).await?;
        log_scheduled(follow_up.id, id, delay);
        Ok(id)
    }
}

fn job_for(
    follow_up_id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    scheduled_at: DateTime<Utc>,
) -> (ScheduledJob, Duration) {
    let delay = fire_delay(scheduled_at, Utc::now());
    let job = ScheduledJob::new(
        follow_up_id,
        patient_id,
        doctor_id,
        scheduled_at,
        delay.as_millis() as u64,
    );
    (job, delay)
}

fn log_scheduled(follow_up_id: Uuid, job_id: JobId, delay: Duration) {
    tracing::info!(
        follow_up_id = %follow_up_id,
        job_id = %job_id,
        delay_ms = delay.as_millis() as u64,
        "Follow-up scheduled"
    );
}
