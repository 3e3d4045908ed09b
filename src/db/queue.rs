use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Executor, PgConnection, Postgres};
use std::time::Duration;
use uuid::Uuid;

use super::models::JobRow;
use crate::scheduler::{
    JobId, JobQueue, ReservedJob, RetryOutcome, RetryPolicy, ScheduledJob, SchedulingError,
};

/// Durable delay queue on the `scheduled_jobs` table. Several workers may
/// poll the same table; `SKIP LOCKED` keeps them from claiming the same row.
pub struct PgJobQueue {
    pool: PgPool,
    policy: RetryPolicy,
    visibility_timeout: Duration,
}

impl PgJobQueue {
    pub fn new(pool: PgPool, policy: RetryPolicy, visibility_timeout: Duration) -> Self {
        Self {
            pool,
            policy,
            visibility_timeout,
        }
    }
}

fn decode(row: JobRow) -> Result<ReservedJob, SchedulingError> {
    let job: ScheduledJob = serde_json::from_value(row.payload)
        .map_err(|e| SchedulingError::Payload(format!("job {}: {}", row.id, e)))?;
    Ok(ReservedJob {
        id: row.id,
        job,
        attempts: row.attempts.max(0) as u32,
    })
}

/// Upsert the row for `job`. Runs on the pool for standalone enqueues and on
/// the caller's transaction for [`JobQueue::enqueue_in`].
async fn insert_job<'e, E>(
    executor: E,
    job: &ScheduledJob,
    delay: Duration,
) -> Result<JobId, SchedulingError>
where
    E: Executor<'e, Database = Postgres>,
{
    let payload = serde_json::to_value(job).map_err(|e| SchedulingError::Payload(e.to_string()))?;

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO scheduled_jobs (id, job_key, payload, run_at)
        VALUES ($1, $2, $3, NOW() + make_interval(secs => $4))
        ON CONFLICT (job_key) DO UPDATE
        SET payload = EXCLUDED.payload,
            run_at = EXCLUDED.run_at,
            state = 'pending',
            attempts = 0,
            last_error = NULL,
            locked_at = NULL
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job.key())
    .bind(payload)
    .bind(delay.as_secs_f64())
    .fetch_one(executor)
    .await?;

    Ok(id)
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job: ScheduledJob, delay: Duration) -> Result<JobId, SchedulingError> {
        insert_job(&self.pool, &job, delay).await
    }

    async fn enqueue_in(
        &self,
        conn: &mut PgConnection,
        job: ScheduledJob,
        delay: Duration,
    ) -> Result<JobId, SchedulingError> {
        insert_job(conn, &job, delay).await
    }

    async fn reserve(&self) -> Result<Option<ReservedJob>, SchedulingError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE scheduled_jobs
            SET state = 'running', attempts = attempts + 1, locked_at = NOW()
            WHERE id = (
                SELECT id FROM scheduled_jobs
                WHERE (state = 'pending' AND run_at <= NOW())
                   OR (state = 'running' AND locked_at < NOW() - make_interval(secs => $1))
                ORDER BY run_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, payload, attempts
            "#,
        )
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    async fn ack(&self, id: JobId) -> Result<(), SchedulingError> {
        sqlx::query("DELETE FROM scheduled_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn retry(
        &self,
        id: JobId,
        attempts: u32,
        error: &str,
    ) -> Result<RetryOutcome, SchedulingError> {
        match self.policy.next_delay(attempts) {
            Some(delay) => {
                sqlx::query(
                    r#"
                    UPDATE scheduled_jobs
                    SET state = 'pending', run_at = NOW() + make_interval(secs => $2),
                        last_error = $3, locked_at = NULL
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(delay.as_secs_f64())
                .bind(error)
                .execute(&self.pool)
                .await?;
                Ok(RetryOutcome::Rearmed(delay))
            }
            None => {
                sqlx::query(
                    "UPDATE scheduled_jobs SET state = 'failed', last_error = $2, locked_at = NULL WHERE id = $1",
                )
                .bind(id)
                .bind(error)
                .execute(&self.pool)
                .await?;
                Ok(RetryOutcome::GaveUp)
            }
        }
    }
}
