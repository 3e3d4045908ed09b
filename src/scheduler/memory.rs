use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::job::{JobId, ReservedJob, ScheduledJob};
use super::queue::{JobQueue, RetryOutcome, RetryPolicy, SchedulingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    Running,
    Failed,
}

#[derive(Debug, Clone)]
struct Entry {
    id: JobId,
    job: ScheduledJob,
    due: Instant,
    attempts: u32,
    state: EntryState,
    last_error: Option<String>,
}

/// In-process delay queue. Not durable; used by tests and `--memory` runs.
pub struct MemoryJobQueue {
    entries: Mutex<Vec<Entry>>,
    policy: RetryPolicy,
}

impl MemoryJobQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            policy,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Entry>>, SchedulingError> {
        self.entries
            .lock()
            .map_err(|_| SchedulingError::Unavailable("memory queue lock poisoned".to_string()))
    }

    /// Jobs waiting to run, including ones not yet due.
    pub fn pending_count(&self) -> usize {
        self.count(EntryState::Pending)
    }

    /// Jobs parked after exhausting their retries.
    pub fn failed_count(&self) -> usize {
        self.count(EntryState::Failed)
    }

    fn count(&self, state: EntryState) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.iter().filter(|e| e.state == state).count())
            .unwrap_or(0)
    }

    /// Payload of the job queued for a follow-up, if any.
    pub fn job_for(&self, follow_up_id: Uuid) -> Option<ScheduledJob> {
        let key = follow_up_id.to_string();
        self.entries
            .lock()
            .ok()?
            .iter()
            .find(|e| e.job.key() == key)
            .map(|e| e.job.clone())
    }

    /// Last recorded failure for a follow-up's job.
    pub fn last_error_for(&self, follow_up_id: Uuid) -> Option<String> {
        let key = follow_up_id.to_string();
        self.entries
            .lock()
            .ok()?
            .iter()
            .find(|e| e.job.key() == key)
            .and_then(|e| e.last_error.clone())
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: ScheduledJob, delay: Duration) -> Result<JobId, SchedulingError> {
        let due = Instant::now() + delay;
        let mut entries = self.lock()?;
        let key = job.key();

        if let Some(existing) = entries.iter_mut().find(|e| e.job.key() == key) {
            existing.job = job;
            existing.due = due;
            existing.attempts = 0;
            existing.state = EntryState::Pending;
            existing.last_error = None;
            tracing::debug!(job_id = %existing.id, "Rescheduled queued job");
            return Ok(existing.id);
        }

        let id = Uuid::new_v4();
        entries.push(Entry {
            id,
            job,
            due,
            attempts: 0,
            state: EntryState::Pending,
            last_error: None,
        });
        Ok(id)
    }

    async fn reserve(&self) -> Result<Option<ReservedJob>, SchedulingError> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        let next = entries
            .iter_mut()
            .filter(|e| e.state == EntryState::Pending && e.due <= now)
            .min_by_key(|e| e.due);

        Ok(next.map(|entry| {
            entry.state = EntryState::Running;
            entry.attempts += 1;
            ReservedJob {
                id: entry.id,
                job: entry.job.clone(),
                attempts: entry.attempts,
            }
        }))
    }

    async fn ack(&self, id: JobId) -> Result<(), SchedulingError> {
        self.lock()?.retain(|e| e.id != id);
        Ok(())
    }

    async fn retry(
        &self,
        id: JobId,
        attempts: u32,
        error: &str,
    ) -> Result<RetryOutcome, SchedulingError> {
        let mut entries = self.lock()?;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return Ok(RetryOutcome::GaveUp);
        };

        entry.last_error = Some(error.to_string());
        match self.policy.next_delay(attempts) {
            Some(delay) => {
                entry.state = EntryState::Pending;
                entry.due = Instant::now() + delay;
                Ok(RetryOutcome::Rearmed(delay))
            }
            None => {
                entry.state = EntryState::Failed;
                Ok(RetryOutcome::GaveUp)
            }
        }
    }
}
