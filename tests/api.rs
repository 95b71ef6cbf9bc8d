//! Status API integration tests

use std::sync::Arc;

use ambient_orb::api::{ApiState, router};
use ambient_orb::input::{TriggerKind, TriggerReceiver, trigger_channel};
use ambient_orb::orchestrator::ControlCommand;
use ambient_orb::{OrbState, OrbStatus};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use tokio::sync::mpsc;
use tower::ServiceExt;

struct TestApi {
    app: axum::Router,
    status: Arc<OrbStatus>,
    triggers: TriggerReceiver,
    control: mpsc::Receiver<ControlCommand>,
}

/// Build a test API router
fn build_test_api() -> TestApi {
    let status = Arc::new(OrbStatus::new(true));
    let (trigger_tx, triggers) = trigger_channel();
    let (control_tx, control) = mpsc::channel(4);

    let state = Arc::new(ApiState {
        status: Arc::clone(&status),
        triggers: trigger_tx,
        control: control_tx,
    });

    TestApi {
        app: router(state),
        status,
        triggers,
        control,
    }
}

async fn send(app: axum::Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let api = build_test_api();
    api.status.set_ambient_running(true);

    let (status, json) = send(api.app, Method::GET, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["ambient_running"], true);
    assert!(json["last_error"].is_null());
}

#[tokio::test]
async fn test_health_reports_last_error() {
    let api = build_test_api();
    api.status
        .set_last_error(Some("provider error: chat failed".to_string()));

    let (_, json) = send(api.app, Method::GET, "/health").await;

    assert_eq!(json["ok"], false);
    assert_eq!(json["ambient_running"], false);
    assert_eq!(json["last_error"], "provider error: chat failed");
}

#[tokio::test]
async fn test_state_endpoint() {
    let api = build_test_api();
    api.status.set_state(OrbState::Speaking);
    api.status.set_last_transcript("what   is\nthe time");
    api.status.set_last_reply("It is noon.");

    let (status, json) = send(api.app, Method::GET, "/state").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "speaking");
    assert_eq!(json["dry_run"], true);
    assert!(
        json["last_transcript_summary"]
            .as_str()
            .unwrap()
            .starts_with("what is the time")
    );
    assert!(
        json["last_reply_summary"]
            .as_str()
            .unwrap()
            .contains("It is noon.")
    );
}

#[tokio::test]
async fn test_state_before_any_interaction() {
    let api = build_test_api();

    let (_, json) = send(api.app, Method::GET, "/state").await;

    assert_eq!(json["state"], "ambient");
    assert!(json["last_transcript_summary"].is_null());
    assert!(json["last_reply_summary"].is_null());
}

#[tokio::test]
async fn test_trigger_action_fires_once() {
    let mut api = build_test_api();

    let (status, json) = send(api.app.clone(), Method::POST, "/actions/trigger").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["triggered"], true);

    // Still pending, so the second request is coalesced
    let (_, json) = send(api.app, Method::POST, "/actions/trigger").await;
    assert_eq!(json["triggered"], false);

    let trigger = api.triggers.try_recv().unwrap();
    assert_eq!(trigger.kind, TriggerKind::Remote);
    assert!(api.triggers.try_recv().is_err());
}

#[tokio::test]
async fn test_reset_action_queues_command() {
    let mut api = build_test_api();

    let (status, json) = send(api.app, Method::POST, "/actions/reset").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reset"], true);
    assert_eq!(
        api.control.try_recv().unwrap(),
        ControlCommand::ResetConversation
    );
}

#[tokio::test]
async fn test_reset_without_orchestrator_is_unavailable() {
    let api = build_test_api();
    drop(api.control);

    let (status, _) = send(api.app, Method::POST, "/actions/reset").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_trigger_requires_post() {
    let api = build_test_api();

    let (status, _) = send(api.app, Method::GET, "/actions/trigger").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let api = build_test_api();

    let (status, _) = send(api.app, Method::GET, "/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
