#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use careloop_server::ai::{AiDecision, AiServiceError, PatientContext, Responder};
use careloop_server::channel::{ChannelError, MessageChannel};
use careloop_server::db::{ConversationStore, MemoryStore};
use careloop_server::models::{
    Doctor, FollowUp, NewFollowUp, NewPatient, Patient, PreferredContactMethod,
};
use careloop_server::notify::{DoctorNotification, DoctorNotifier, NotificationError};
use careloop_server::scheduler::{
    FollowUpScheduler, JobId, JobQueue, MemoryJobQueue, ReservedJob, RetryOutcome, RetryPolicy,
    ScheduledJob, SchedulingError,
};
use careloop_server::webhook::{ProcessorConfig, WebhookProcessor};

pub const PHONE: &str = "+15551234567";

/// Channel that records every send
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingChannel {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(&self, to: &str, text: &str) -> Result<String, ChannelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Unreachable("test channel down".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), text.to_string()));
        Ok(format!("SM{:04}", sent.len()))
    }
}

/// Responder returning queued decisions in order, recording each context
#[derive(Default)]
pub struct ScriptedResponder {
    script: Mutex<VecDeque<Result<AiDecision, AiServiceError>>>,
    contexts: Mutex<Vec<PatientContext>>,
}

impl ScriptedResponder {
    pub fn push(&self, result: Result<AiDecision, AiServiceError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn reply(&self, message: &str, intervene: bool, end: bool) {
        self.push(Ok(AiDecision {
            message: message.to_string(),
            doctor_intervention_required: intervene,
            end_of_conversation: end,
        }));
    }

    pub fn contexts(&self) -> Vec<PatientContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn generate(&self, context: &PatientContext) -> Result<AiDecision, AiServiceError> {
        self.contexts.lock().unwrap().push(context.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiServiceError::Malformed("no scripted reply".into())))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<DoctorNotification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<DoctorNotification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DoctorNotifier for RecordingNotifier {
    async fn notify(&self, notification: &DoctorNotification) -> Result<(), NotificationError> {
        self.notifications.lock().unwrap().push(notification.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Rejected {
                status: 502,
                body: "relay down".into(),
            });
        }
        Ok(())
    }
}

/// Queue whose backend is always unreachable
pub struct FailingQueue;

#[async_trait]
impl JobQueue for FailingQueue {
    async fn enqueue(&self, _job: ScheduledJob, _delay: Duration) -> Result<JobId, SchedulingError> {
        Err(SchedulingError::Unavailable("connection refused".into()))
    }

    async fn reserve(&self) -> Result<Option<ReservedJob>, SchedulingError> {
        Err(SchedulingError::Unavailable("connection refused".into()))
    }

    async fn ack(&self, _id: JobId) -> Result<(), SchedulingError> {
        Err(SchedulingError::Unavailable("connection refused".into()))
    }

    async fn retry(
        &self,
        _id: JobId,
        _attempts: u32,
        _error: &str,
    ) -> Result<RetryOutcome, SchedulingError> {
        Err(SchedulingError::Unavailable("connection refused".into()))
    }
}

pub fn new_patient(doctor_id: uuid::Uuid, phone: &str) -> NewPatient {
    NewPatient {
        doctor_id,
        name: "Maria Lopez".into(),
        phone: phone.into(),
        preferred_contact_method: PreferredContactMethod::Whatsapp,
        age: 52,
        gender: "female".into(),
        blood_type: "A+".into(),
        known_conditions: vec!["hypertension".into()],
        allergies: vec![],
        medications: vec!["amlodipine".into()],
    }
}

pub fn new_follow_up(doctor_id: uuid::Uuid, scheduled_at: DateTime<Utc>) -> NewFollowUp {
    NewFollowUp {
        doctor_id,
        scheduled_at,
        visit_summary: "blood pressure review".into(),
        diagnosis: "hypertension".into(),
        prescription: "amlodipine 5mg daily".into(),
        doctor_notes: String::new(),
        notes: String::new(),
        critical_flag: false,
    }
}

/// Everything wired together with fakes around an in-memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryJobQueue>,
    pub scheduler: FollowUpScheduler,
    pub channel: Arc<RecordingChannel>,
    pub responder: Arc<ScriptedResponder>,
    pub notifier: Arc<RecordingNotifier>,
    pub processor: Arc<WebhookProcessor>,
    pub doctor: Doctor,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_policy(RetryPolicy::default()).await
    }

    pub async fn with_policy(policy: RetryPolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryJobQueue::new(policy));
        let scheduler = FollowUpScheduler::new(queue.clone());
        let channel = Arc::new(RecordingChannel::default());
        let responder = Arc::new(ScriptedResponder::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let processor = Arc::new(WebhookProcessor::new(
            store.clone(),
            scheduler.clone(),
            channel.clone(),
            responder.clone(),
            notifier.clone(),
            ProcessorConfig {
                context_window: 8,
                escalation_delay: Duration::from_secs(60),
                notify_timeout: Duration::from_secs(2),
            },
        ));

        let org = store.create_organization("Riverside Clinic").await.unwrap();
        let doctor = store
            .create_doctor(org.id, "Okafor", "okafor@example.org")
            .await
            .unwrap();

        Self {
            store,
            queue,
            scheduler,
            channel,
            responder,
            notifier,
            processor,
            doctor,
        }
    }

    /// Register the standard patient with a follow-up due in an hour.
    pub async fn register(&self) -> (Patient, FollowUp) {
        self.register_at(Utc::now() + ChronoDuration::hours(1)).await
    }

    pub async fn register_at(&self, scheduled_at: DateTime<Utc>) -> (Patient, FollowUp) {
        self.store
            .create_patient_with_follow_up(
                new_patient(self.doctor.id, PHONE),
                new_follow_up(self.doctor.id, scheduled_at),
                &self.scheduler,
            )
            .await
            .unwrap()
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
