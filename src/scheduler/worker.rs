use async_trait::async_trait;
use chrono::{Local, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use super::greeting::compose_follow_up_message;
use super::job::ScheduledJob;
use super::queue::{ConsumeOutcome, JobError, JobHandler, JobQueue};
use crate::channel::MessageChannel;
use crate::db::ConversationStore;
use crate::models::NewMessage;

/// What a fired job ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent { message_id: Uuid, provider_id: String },
    /// Nothing to send; the job is consumed without retry.
    Skipped(&'static str),
}

/// Consumes due follow-up jobs, one at a time.
pub struct FollowUpWorker {
    store: Arc<dyn ConversationStore>,
    channel: Arc<dyn MessageChannel>,
    queue: Arc<dyn JobQueue>,
    poll_interval: Duration,
}

impl FollowUpWorker {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        channel: Arc<dyn MessageChannel>,
        queue: Arc<dyn JobQueue>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            channel,
            queue,
            poll_interval,
        }
    }

    /// Send the greeting for one job. Clinical content is loaded at fire
    /// time so edits made after scheduling are honoured.
    pub async fn deliver(&self, job: &ScheduledJob) -> Result<Delivery, JobError> {
        let Some(details) = self.store.load_follow_up_details(job.follow_up_id).await? else {
            tracing::warn!(
                follow_up_id = %job.follow_up_id,
                "Follow-up no longer exists, dropping job"
            );
            return Ok(Delivery::Skipped("follow-up not found"));
        };

        if details.patient.phone.trim().is_empty() {
            tracing::warn!(
                follow_up_id = %job.follow_up_id,
                patient_id = %details.patient.id,
                "Patient has no phone number, dropping job"
            );
            return Ok(Delivery::Skipped("patient has no phone number"));
        }

        let text = compose_follow_up_message(&details, Local::now().hour());
        let saved = self
            .store
            .save_message(NewMessage::outbound(
                details.patient.id,
                details.doctor.id,
                text.clone(),
            ))
            .await?;

        let provider_id = self.channel.send(&details.patient.phone, &text).await?;

        tracing::info!(
            follow_up_id = %job.follow_up_id,
            patient_id = %details.patient.id,
            message_id = %saved.id,
            "✓ Follow-up message sent"
        );
        Ok(Delivery::Sent {
            message_id: saved.id,
            provider_id,
        })
    }

    /// Run one consume cycle against the queue.
    pub async fn tick(&self) -> ConsumeOutcome {
        match self.queue.consume(self).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Job queue unavailable");
                ConsumeOutcome::Idle
            }
        }
    }

    /// Consume jobs until `shutdown` flips to true or its sender is dropped.
    /// A job in progress always finishes first.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            "Follow-up worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.tick().await != ConsumeOutcome::Idle {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Follow-up worker stopped");
    }
}

#[async_trait]
impl JobHandler for FollowUpWorker {
    async fn handle(&self, job: &ScheduledJob) -> Result<(), JobError> {
        self.deliver(job).await.map(|_| ())
    }
}
