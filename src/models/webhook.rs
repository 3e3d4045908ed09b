use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::channel::strip_whatsapp_scheme;

/// Form body posted by the messaging provider for an inbound message.
/// Only `From` and `Body` are relied upon; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundWebhook {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: Option<String>,
}

/// Validated inbound message, ready for background processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Sender number with the channel scheme removed, e.g. `+15551234567`.
    pub phone: String,
    /// Message text exactly as received.
    pub body: String,
    pub provider_id: Option<String>,
}

impl InboundWebhook {
    pub fn into_event(self) -> Result<InboundEvent, ValidationError> {
        let from = self
            .from
            .filter(|f| !f.trim().is_empty())
            .ok_or(ValidationError::MissingWebhookFields)?;
        let body = self
            .body
            .filter(|b| !b.is_empty())
            .ok_or(ValidationError::MissingWebhookFields)?;

        let phone = strip_whatsapp_scheme(from.trim()).to_string();
        if phone.is_empty() {
            return Err(ValidationError::MissingWebhookFields);
        }

        Ok(InboundEvent {
            phone,
            body,
            provider_id: self.message_sid,
        })
    }
}

/// Immediate acknowledgment returned to the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    pub message: String,
}

impl WebhookAck {
    pub fn accepted() -> Self {
        Self {
            status: "success".to_string(),
            message: "Message received and processing".to_string(),
        }
    }
}
