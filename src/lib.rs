//! Careloop: automated patient follow-ups over WhatsApp.
//!
//! Doctors register patients with a follow-up; the scheduler sends the
//! first message when the follow-up is due, and the webhook processor
//! carries the conversation on from the patient's replies.

pub mod ai;
pub mod channel;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod webhook;

use axum::{
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use db::ConversationStore;
use scheduler::FollowUpScheduler;
use webhook::InboundDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub scheduler: FollowUpScheduler,
    pub dispatcher: InboundDispatcher,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/whatsapp", post(handlers::receive_whatsapp))
        .route("/patients", post(handlers::create_patient))
        .route("/patients/:id", get(handlers::get_patient))
        .route("/follow-ups/:id", patch(handlers::update_follow_up))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}
