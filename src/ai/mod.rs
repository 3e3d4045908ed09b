//! Conversational responder.
//!
//! Given a patient's clinical context and recent conversation, produce a
//! reply plus two flags: whether the doctor must step in and whether the
//! follow-up can be closed. Output that does not match that exact shape is
//! an error, never forwarded to the patient.

pub mod groq;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Direction, Message};

pub use groq::{GroqConfig, GroqResponder};

#[derive(Debug, Error)]
pub enum AiServiceError {
    #[error("AI provider unreachable: {0}")]
    Unreachable(String),

    #[error("AI provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("AI provider returned no content")]
    EmptyResponse,

    #[error("Malformed AI decision: {0}")]
    Malformed(String),
}

/// Who wrote a message, from the assistant's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Patient,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub sender: Sender,
    pub text: String,
}

impl From<&Message> for ContextMessage {
    fn from(msg: &Message) -> Self {
        Self {
            sender: match msg.direction {
                Direction::Inbound => Sender::Patient,
                Direction::Outbound => Sender::System,
            },
            text: msg.content.clone(),
        }
    }
}

/// Everything the responder is told about a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientContext {
    pub patient_name: String,
    pub doctor_name: String,
    pub organization_name: String,
    pub diagnosis: String,
    pub prescription: String,
    pub visit_summary: String,
    /// Most recent first.
    pub previous_messages: Vec<ContextMessage>,
}

/// Structured reply produced by the responder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AiDecision {
    pub message: String,
    pub doctor_intervention_required: bool,
    pub end_of_conversation: bool,
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn generate(&self, context: &PatientContext) -> Result<AiDecision, AiServiceError>;
}

/// Parse the raw completion text into a decision.
///
/// The text must be a single JSON object carrying exactly `message`,
/// `doctorInterventionRequired` and `endOfConversation`.
pub fn parse_decision(raw: &str) -> Result<AiDecision, AiServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AiServiceError::EmptyResponse);
    }

    let decision: AiDecision =
        serde_json::from_str(raw).map_err(|e| AiServiceError::Malformed(e.to_string()))?;

    if decision.message.trim().is_empty() {
        return Err(AiServiceError::Malformed("empty message".to_string()));
    }
    Ok(decision)
}
