use axum::{extract::State, Form, Json};

use super::ApiError;
use crate::models::{InboundWebhook, WebhookAck};
use crate::AppState;

/// POST /webhook/whatsapp
/// Validate the provider's form post and hand it to background processing.
/// The reply to the patient is sent later; this only acknowledges receipt.
pub async fn receive_whatsapp(
    State(state): State<AppState>,
    Form(payload): Form<InboundWebhook>,
) -> Result<Json<WebhookAck>, ApiError> {
    let event = payload.into_event()?;

    tracing::info!(
        phone = %event.phone,
        provider_id = event.provider_id.as_deref().unwrap_or("-"),
        body_len = event.body.len(),
        "Inbound WhatsApp message"
    );

    state.dispatcher.submit(event).map_err(|e| {
        tracing::error!(error = %e, "Dropping inbound message");
        ApiError::unavailable("Message processing is shutting down")
    })?;

    Ok(Json(WebhookAck::accepted()))
}
