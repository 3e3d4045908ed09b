mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use common::{new_follow_up, new_patient, FailingQueue, Harness, PHONE};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use careloop_server::db::ConversationStore;
use careloop_server::scheduler::FollowUpScheduler;
use careloop_server::webhook::replies::UNKNOWN_SENDER;
use careloop_server::webhook::InboundDispatcher;
use careloop_server::{build_router, AppState};

fn app(h: &Harness) -> Router {
    let (dispatcher, dispatch_loop) = InboundDispatcher::new(h.processor.clone(), 4);
    tokio::spawn(dispatch_loop);
    build_router(AppState {
        store: h.store.clone(),
        scheduler: h.scheduler.clone(),
        dispatcher,
    })
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn registration(doctor_id: Uuid, follow_up_doctor: Uuid) -> Value {
    json!({
        "patient": new_patient(doctor_id, PHONE),
        "followUp": new_follow_up(follow_up_doctor, Utc::now() + chrono::Duration::hours(2)),
    })
}

#[tokio::test]
async fn health_check_returns_ok() {
    let h = Harness::new().await;
    let response = app(&h)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_acknowledges_then_replies_in_background() {
    let h = Harness::new().await;

    let response = app(&h)
        .oneshot(form(
            "/webhook/whatsapp",
            "From=whatsapp%3A%2B19998887777&Body=hello&MessageSid=SM123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "success", "message": "Message received and processing"})
    );

    let channel = h.channel.clone();
    assert!(
        common::wait_for(Duration::from_secs(2), || {
            let channel = channel.clone();
            async move { !channel.sent().is_empty() }
        })
        .await
    );
    assert_eq!(
        h.channel.sent(),
        vec![("+19998887777".to_string(), UNKNOWN_SENDER.to_string())]
    );
}

#[tokio::test]
async fn webhook_without_body_is_rejected_synchronously() {
    let h = Harness::new().await;

    let response = app(&h)
        .oneshot(form("/webhook/whatsapp", "From=whatsapp%3A%2B15551234567"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"status": "error", "message": "Missing required fields: From or Body"})
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.channel.sent().is_empty());
}

#[tokio::test]
async fn register_patient_creates_and_schedules() {
    let h = Harness::new().await;

    let response = app(&h)
        .oneshot(json_request(
            "POST",
            "/patients",
            registration(h.doctor.id, h.doctor.id),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["patient"]["phone"], PHONE);
    assert!(body["followUp"]["completedAt"].is_null());

    let follow_up_id: Uuid = body["followUp"]["id"].as_str().unwrap().parse().unwrap();
    assert!(h.queue.job_for(follow_up_id).is_some());
}

#[tokio::test]
async fn register_patient_with_mismatched_doctor_is_rejected() {
    let h = Harness::new().await;

    let response = app(&h)
        .oneshot(json_request(
            "POST",
            "/patients",
            registration(h.doctor.id, Uuid::new_v4()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], "error");
    assert!(h.store.find_patient_by_phone(PHONE).await.unwrap().is_none());
}

#[tokio::test]
async fn register_patient_fails_when_queue_is_down() {
    let h = Harness::new().await;
    let (dispatcher, _loop) = InboundDispatcher::new(h.processor.clone(), 4);
    let router = build_router(AppState {
        store: h.store.clone(),
        scheduler: FollowUpScheduler::new(Arc::new(FailingQueue)),
        dispatcher,
    });

    let response = router
        .oneshot(json_request(
            "POST",
            "/patients",
            registration(h.doctor.id, h.doctor.id),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(h.store.find_patient_by_phone(PHONE).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_phone_is_a_conflict() {
    let h = Harness::new().await;
    h.register().await;

    let response = app(&h)
        .oneshot(json_request(
            "POST",
            "/patients",
            registration(h.doctor.id, h.doctor.id),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn get_patient_returns_details_or_404() {
    let h = Harness::new().await;
    let (patient, follow_up) = h.register().await;
    let router = app(&h);

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/patients/{}", patient.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["patient"]["name"], "Maria Lopez");
    assert_eq!(body["followUps"][0]["id"], follow_up.id.to_string());

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/patients/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_up_edits_are_refused_once_completed() {
    let h = Harness::new().await;
    let (_, follow_up) = h.register().await;
    let router = app(&h);
    let uri = format!("/follow-ups/{}", follow_up.id);

    let response = router
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({"visitSummary": "knee review"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["visitSummary"], "knee review");

    let response = router
        .clone()
        .oneshot(json_request("PATCH", &uri, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    h.store.complete_follow_up(follow_up.id).await.unwrap();
    let response = router
        .oneshot(json_request("PATCH", &uri, json!({"notes": "too late"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
