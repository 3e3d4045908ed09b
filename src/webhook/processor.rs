use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::help::{is_help_request, HelpEscalation};
use super::locks::PatientLocks;
use super::replies::{ALREADY_COMPLETE, PROCESSING_FALLBACK, UNKNOWN_SENDER};
use crate::ai::{AiServiceError, ContextMessage, PatientContext, Responder};
use crate::channel::MessageChannel;
use crate::db::{ConversationStore, StoreError};
use crate::models::{InboundEvent, NewFollowUp, NewMessage, PatientRecord};
use crate::notify::{DoctorNotification, DoctorNotifier};
use crate::scheduler::FollowUpScheduler;

/// Failure inside background processing; turned into the fallback reply.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ai(#[from] AiServiceError),
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Messages handed to the responder as conversational context.
    pub context_window: usize,
    /// How far ahead a follow-up re-opened by a help request is scheduled.
    pub escalation_delay: Duration,
    pub notify_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            context_window: 8,
            escalation_delay: Duration::from_secs(60),
            notify_timeout: Duration::from_secs(10),
        }
    }
}

/// Which branch of the state machine handled a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    UnknownSender,
    AlreadyComplete,
    HelpEscalated { reopened: bool, doctor_notified: bool },
    AiReplied { completed: bool, escalated: bool },
    /// Processing failed and the generic fallback was sent.
    Failed,
}

#[derive(Debug)]
struct Processed {
    outcome: Outcome,
    reply: String,
}

pub struct WebhookProcessor {
    store: Arc<dyn ConversationStore>,
    scheduler: FollowUpScheduler,
    channel: Arc<dyn MessageChannel>,
    responder: Arc<dyn Responder>,
    notifier: Arc<dyn DoctorNotifier>,
    help: HelpEscalation,
    locks: PatientLocks,
    config: ProcessorConfig,
}

impl WebhookProcessor {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        scheduler: FollowUpScheduler,
        channel: Arc<dyn MessageChannel>,
        responder: Arc<dyn Responder>,
        notifier: Arc<dyn DoctorNotifier>,
        config: ProcessorConfig,
    ) -> Self {
        let help = HelpEscalation::new(store.clone(), notifier.clone(), config.notify_timeout);
        Self {
            store,
            scheduler,
            channel,
            responder,
            notifier,
            help,
            locks: PatientLocks::new(),
            config,
        }
    }

    /// Process one inbound message and reply to the sender. Never fails:
    /// errors are logged and answered with the generic fallback.
    pub async fn handle(&self, event: &InboundEvent) -> Outcome {
        let _guard = self.locks.lock(&event.phone).await;

        let (outcome, reply) = match self.process(event).await {
            Ok(processed) => (processed.outcome, processed.reply),
            Err(e) => {
                tracing::error!(phone = %event.phone, error = %e, "Background processing error");
                (Outcome::Failed, PROCESSING_FALLBACK.to_string())
            }
        };

        if let Err(e) = self.channel.send(&event.phone, &reply).await {
            tracing::error!(
                phone = %event.phone,
                outcome = ?outcome,
                error = %e,
                "Failed to send WhatsApp reply"
            );
        }
        outcome
    }

    async fn process(&self, event: &InboundEvent) -> Result<Processed, ProcessingError> {
        let Some(record) = self.store.find_patient_by_phone(&event.phone).await? else {
            tracing::info!(phone = %event.phone, "Message from unknown sender");
            return Ok(Processed {
                outcome: Outcome::UnknownSender,
                reply: UNKNOWN_SENDER.to_string(),
            });
        };

        let patient_id = record.patient.id;
        let doctor_id = record.patient.doctor_id;

        self.store
            .save_message(NewMessage::inbound(patient_id, doctor_id, event.body.clone()))
            .await?;

        let help_requested = is_help_request(&event.body);

        if record.latest_is_completed() {
            if help_requested {
                let scheduled_at = Utc::now()
                    + chrono::Duration::from_std(self.config.escalation_delay)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                let reopened = self
                    .store
                    .open_follow_up(
                        patient_id,
                        NewFollowUp::help_request(doctor_id, scheduled_at),
                        &self.scheduler,
                    )
                    .await?;
                tracing::info!(
                    patient_id = %patient_id,
                    follow_up_id = %reopened.id,
                    "Follow-up re-opened by help request"
                );

                let escalation = self.help.escalate(&record, &event.body).await?;
                return Ok(Processed {
                    outcome: Outcome::HelpEscalated {
                        reopened: true,
                        doctor_notified: escalation.doctor_notified,
                    },
                    reply: escalation.reply,
                });
            }

            self.store
                .save_message(NewMessage::outbound(patient_id, doctor_id, ALREADY_COMPLETE))
                .await?;
            return Ok(Processed {
                outcome: Outcome::AlreadyComplete,
                reply: ALREADY_COMPLETE.to_string(),
            });
        }

        if help_requested {
            let escalation = self.help.escalate(&record, &event.body).await?;
            return Ok(Processed {
                outcome: Outcome::HelpEscalated {
                    reopened: false,
                    doctor_notified: escalation.doctor_notified,
                },
                reply: escalation.reply,
            });
        }

        self.converse(&record, &event.body).await
    }

    /// Default branch: let the responder answer in context.
    async fn converse(
        &self,
        record: &PatientRecord,
        body: &str,
    ) -> Result<Processed, ProcessingError> {
        let patient = &record.patient;
        let history = self
            .store
            .recent_messages(patient.id, self.config.context_window)
            .await?;

        let latest = record.latest_follow_up.as_ref();
        let context = PatientContext {
            patient_name: patient.name.clone(),
            doctor_name: record.doctor.name.clone(),
            organization_name: record.organization.name.clone(),
            diagnosis: latest.map(|f| f.diagnosis.clone()).unwrap_or_default(),
            prescription: latest.map(|f| f.prescription.clone()).unwrap_or_default(),
            visit_summary: latest.map(|f| f.visit_summary.clone()).unwrap_or_default(),
            previous_messages: history.iter().map(ContextMessage::from).collect(),
        };

        let decision = self.responder.generate(&context).await?;
        tracing::info!(
            patient_id = %patient.id,
            doctor_intervention_required = decision.doctor_intervention_required,
            end_of_conversation = decision.end_of_conversation,
            "AI reply generated"
        );

        self.store
            .save_message(NewMessage::outbound(
                patient.id,
                patient.doctor_id,
                decision.message.clone(),
            ))
            .await?;

        let mut completed = false;
        if decision.end_of_conversation {
            if let Some(active) = record.active_follow_up() {
                self.store.complete_follow_up(active.id).await?;
                completed = true;
            }
        }

        if decision.doctor_intervention_required {
            self.spawn_doctor_notification(DoctorNotification {
                doctor_email: record.doctor.email.clone(),
                doctor_name: record.doctor.name.clone(),
                patient_name: patient.name.clone(),
                patient_id: patient.id,
                organization_name: record.organization.name.clone(),
                message: body.to_string(),
                urgent_flag: true,
            });
        }

        Ok(Processed {
            outcome: Outcome::AiReplied {
                completed,
                escalated: decision.doctor_intervention_required,
            },
            reply: decision.message,
        })
    }

    fn spawn_doctor_notification(&self, notification: DoctorNotification) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                tracing::warn!(
                    patient_id = %notification.patient_id,
                    error = %e,
                    "Doctor notification failed"
                );
            }
        });
    }
}
