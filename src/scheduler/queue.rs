use async_trait::async_trait;
use sqlx::PgConnection;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;

use super::job::{JobId, ReservedJob, ScheduledJob};
use crate::channel::ChannelError;
use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Job queue unavailable: {0}")]
    Unavailable(String),

    #[error("Job payload could not be encoded: {0}")]
    Payload(String),
}

impl From<sqlx::Error> for SchedulingError {
    fn from(e: sqlx::Error) -> Self {
        SchedulingError::Unavailable(e.to_string())
    }
}

/// Failure while executing a job; handed to the queue's retry policy.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] ChannelError),
}

/// How a queue re-arms failed jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&self, attempts: u32) -> Option<Duration> {
        if attempts >= self.max_attempts {
            return None;
        }
        let exponent = attempts.saturating_sub(1).min(16);
        Some(self.base_backoff.saturating_mul(1u32 << exponent))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Rearmed(Duration),
    GaveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Nothing was due.
    Idle,
    Completed(JobId),
    Retrying(JobId),
    Failed(JobId),
}

/// Code run for each due job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &ScheduledJob) -> Result<(), JobError>;
}

/// Delay queue holding follow-up jobs until they are due.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Store `job` so it becomes due after `delay`. Re-enqueueing the same
    /// follow-up reschedules it.
    async fn enqueue(&self, job: ScheduledJob, delay: Duration) -> Result<JobId, SchedulingError>;

    /// Enqueue on the caller's open transaction so the job commits or rolls
    /// back together with the rows it refers to. Queues kept outside
    /// Postgres ignore `conn` and enqueue directly.
    async fn enqueue_in(
        &self,
        conn: &mut PgConnection,
        job: ScheduledJob,
        delay: Duration,
    ) -> Result<JobId, SchedulingError> {
        let _ = conn;
        self.enqueue(job, delay).await
    }

    /// Claim the earliest due job, if any.
    async fn reserve(&self) -> Result<Option<ReservedJob>, SchedulingError>;

    /// Discard a job that ran to completion.
    async fn ack(&self, id: JobId) -> Result<(), SchedulingError>;

    /// Re-arm a failed job according to the retry policy.
    async fn retry(
        &self,
        id: JobId,
        attempts: u32,
        error: &str,
    ) -> Result<RetryOutcome, SchedulingError>;

    /// Run at most one due job through `handler`.
    async fn consume(&self, handler: &dyn JobHandler) -> Result<ConsumeOutcome, SchedulingError> {
        let Some(reserved) = self.reserve().await? else {
            return Ok(ConsumeOutcome::Idle);
        };

        let span = tracing::info_span!(
            "follow_up_job",
            job_id = %reserved.id,
            follow_up_id = %reserved.job.follow_up_id,
            attempt = reserved.attempts
        );

        match handler.handle(&reserved.job).instrument(span.clone()).await {
            Ok(()) => {
                self.ack(reserved.id).await?;
                Ok(ConsumeOutcome::Completed(reserved.id))
            }
            Err(e) => {
                let reason = e.to_string();
                match self.retry(reserved.id, reserved.attempts, &reason).await? {
                    RetryOutcome::Rearmed(delay) => {
                        tracing::warn!(
                            parent: &span,
                            error = %reason,
                            retry_in_ms = delay.as_millis() as u64,
                            "Follow-up job failed, will retry"
                        );
                        Ok(ConsumeOutcome::Retrying(reserved.id))
                    }
                    RetryOutcome::GaveUp => {
                        tracing::error!(parent: &span, error = %reason, "Follow-up job failed permanently");
                        Ok(ConsumeOutcome::Failed(reserved.id))
                    }
                }
            }
        }
    }
}
