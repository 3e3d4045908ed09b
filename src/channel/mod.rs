//! Outbound messaging channel.
//!
//! The rest of the crate only sees [`MessageChannel`]; the Twilio client is
//! one implementation and tests substitute a recording fake.

pub mod twilio;

use async_trait::async_trait;
use thiserror::Error;

pub use twilio::{TwilioConfig, TwilioWhatsApp};

const WHATSAPP_SCHEME: &str = "whatsapp:";

/// Provider-agnostic send failure taxonomy
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid WhatsApp number: {0}")]
    InvalidNumber(String),

    #[error("Sender is not authenticated with the provider")]
    Unauthenticated,

    #[error("Messaging provider unreachable: {0}")]
    Unreachable(String),

    #[error("Provider rejected message (code {code:?}): {message}")]
    Rejected { code: Option<i64>, message: String },
}

/// Transport capable of delivering a text message to a patient.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Deliver `text` to `to` (E.164, with or without channel scheme).
    /// Returns the provider's message id.
    async fn send(&self, to: &str, text: &str) -> Result<String, ChannelError>;
}

/// Normalise a number to the provider's WhatsApp addressing.
pub fn whatsapp_address(number: &str) -> Result<String, ChannelError> {
    let number = number.trim();
    if number.is_empty() {
        return Err(ChannelError::InvalidRequest(
            "phone number is required".to_string(),
        ));
    }
    if number.starts_with(WHATSAPP_SCHEME) {
        Ok(number.to_string())
    } else {
        Ok(format!("{}{}", WHATSAPP_SCHEME, number))
    }
}

/// Remove the WhatsApp scheme from an inbound sender address.
pub fn strip_whatsapp_scheme(address: &str) -> &str {
    address.strip_prefix(WHATSAPP_SCHEME).unwrap_or(address)
}
