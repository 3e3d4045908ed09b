use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{whatsapp_address, ChannelError, MessageChannel};

/// Provider error codes with a dedicated meaning.
const CODE_INVALID_TO_NUMBER: i64 = 21211;
const CODE_NOT_WHATSAPP_CAPABLE: i64 = 21614;
const CODE_AUTHENTICATION_FAILED: i64 = 20003;

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, with or without the `whatsapp:` scheme.
    pub whatsapp_from: String,
    pub api_base: String,
    pub timeout: Duration,
}

/// WhatsApp sender backed by the Twilio Messages REST API
pub struct TwilioWhatsApp {
    config: TwilioConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct MessageCreated {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioWhatsApp {
    pub fn new(config: TwilioConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChannelError::InvalidRequest(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

/// Translate a provider error into the channel taxonomy.
fn classify_provider_error(status: u16, code: Option<i64>, message: String) -> ChannelError {
    match code {
        Some(CODE_INVALID_TO_NUMBER) => {
            ChannelError::InvalidNumber("invalid WhatsApp number format".to_string())
        }
        Some(CODE_NOT_WHATSAPP_CAPABLE) => {
            ChannelError::InvalidNumber("number is not valid or verified for WhatsApp".to_string())
        }
        Some(CODE_AUTHENTICATION_FAILED) => ChannelError::Unauthenticated,
        _ if status == 401 => ChannelError::Unauthenticated,
        _ if status >= 500 => ChannelError::Unreachable(format!("provider status {}", status)),
        code => ChannelError::Rejected { code, message },
    }
}

#[async_trait]
impl MessageChannel for TwilioWhatsApp {
    async fn send(&self, to: &str, text: &str) -> Result<String, ChannelError> {
        if text.trim().is_empty() {
            return Err(ChannelError::InvalidRequest(
                "message content is required".to_string(),
            ));
        }
        if self.config.whatsapp_from.trim().is_empty() {
            return Err(ChannelError::InvalidRequest(
                "WhatsApp sender number not configured".to_string(),
            ));
        }

        let to = whatsapp_address(to)?;
        let from = whatsapp_address(&self.config.whatsapp_from)?;

        tracing::debug!(to = %to, body_len = text.len(), "Sending WhatsApp message");

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", text)])
            .send()
            .await
            .map_err(|e| ChannelError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: Option<ProviderError> = serde_json::from_str(&body).ok();
            let (code, message) = match parsed {
                Some(err) => (err.code, err.message.unwrap_or(body)),
                None => (None, body),
            };
            let err = classify_provider_error(status.as_u16(), code, message);
            tracing::warn!(to = %to, status = status.as_u16(), error = %err, "WhatsApp send failed");
            return Err(err);
        }

        let created: MessageCreated = response.json().await.map_err(|e| ChannelError::Rejected {
            code: None,
            message: format!("unreadable provider response: {}", e),
        })?;

        tracing::info!(
            to = %to,
            sid = %created.sid,
            status = created.status.as_deref().unwrap_or("unknown"),
            "✓ WhatsApp message sent"
        );
        Ok(created.sid)
    }
}
