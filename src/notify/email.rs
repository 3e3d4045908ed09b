use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{DoctorNotification, DoctorNotifier, NotificationError};

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Endpoint of an HTTP transactional mail API accepting JSON messages.
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    pub timeout: Duration,
}

/// Delivers doctor notifications through an HTTP mail relay, as plain text
pub struct EmailNotifier {
    config: MailConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
}

impl EmailNotifier {
    pub fn new(config: MailConfig) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::Unreachable(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

pub fn subject_for(n: &DoctorNotification) -> String {
    if n.urgent_flag {
        format!("URGENT: {} needs your attention", n.patient_name)
    } else {
        format!("Patient update: {}", n.patient_name)
    }
}

pub fn plain_body(n: &DoctorNotification) -> String {
    format!(
        "Dear Dr. {doctor},\n\n{patient} (patient ID {id}) at {org} sent the following message during an automated follow-up:\n\n\"{message}\"\n\n{closing}\n\nCareloop",
        doctor = n.doctor_name,
        patient = n.patient_name,
        id = n.patient_id,
        org = n.organization_name,
        message = n.message,
        closing = if n.urgent_flag {
            "The patient has asked for help. Please reach out as soon as possible."
        } else {
            "Please review the conversation when convenient."
        },
    )
}

#[async_trait]
impl DoctorNotifier for EmailNotifier {
    async fn notify(&self, n: &DoctorNotification) -> Result<(), NotificationError> {
        let mail = OutgoingMail {
            from: &self.config.from,
            to: vec![n.doctor_email.as_str()],
            subject: subject_for(n),
            text: plain_body(n),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&mail)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::Timeout(self.config.timeout.as_secs())
                } else {
                    NotificationError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            patient_id = %n.patient_id,
            urgent = n.urgent_flag,
            "✓ Doctor notification sent"
        );
        Ok(())
    }
}
