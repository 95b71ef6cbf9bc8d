//! Health and state endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// No error since the last successful interaction
    pub ok: bool,
    pub ambient_running: bool,
    pub last_error: Option<String>,
}

/// Interaction state response
#[derive(Serialize)]
pub struct StateResponse {
    pub state: &'static str,
    pub dry_run: bool,
    pub last_transcript_summary: Option<String>,
    pub last_reply_summary: Option<String>,
}

async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let snap = state.status.snapshot();
    Json(HealthResponse {
        ok: snap.last_error.is_none(),
        ambient_running: snap.ambient_running,
        last_error: snap.last_error,
    })
}

async fn orb_state(State(state): State<Arc<ApiState>>) -> Json<StateResponse> {
    let snap = state.status.snapshot();
    Json(StateResponse {
        state: snap.state.as_str(),
        dry_run: snap.dry_run,
        last_transcript_summary: snap.last_transcript_summary,
        last_reply_summary: snap.last_reply_summary,
    })
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(orb_state))
        .with_state(state)
}
