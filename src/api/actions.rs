//! Remote actions

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Serialize;

use super::ApiState;
use crate::input::TriggerKind;
use crate::orchestrator::ControlCommand;

#[derive(Serialize)]
pub struct TriggerResponse {
    /// `false` when an interaction was already pending
    pub triggered: bool,
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub reset: bool,
}

async fn trigger(State(state): State<Arc<ApiState>>) -> Json<TriggerResponse> {
    Json(TriggerResponse {
        triggered: state.triggers.fire(TriggerKind::Remote),
    })
}

async fn reset(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ResetResponse>, StatusCode> {
    state
        .control
        .send(ControlCommand::ResetConversation)
        .await
        .map_err(|_| {
            tracing::warn!("conversation reset requested but orchestrator is gone");
            StatusCode::SERVICE_UNAVAILABLE
        })?;
    Ok(Json(ResetResponse { reset: true }))
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/trigger", post(trigger))
        .route("/reset", post(reset))
        .with_state(state)
}
