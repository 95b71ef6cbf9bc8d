//! HTTP status API
//!
//! Read-only status for dashboards plus two actions: start an interaction
//! and clear the conversation.

mod actions;
mod status;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::input::TriggerSender;
use crate::orchestrator::ControlCommand;
use crate::state::OrbStatus;
use crate::{Error, Result};

/// Shared state for API handlers
pub struct ApiState {
    /// Orb status snapshot source
    pub status: Arc<OrbStatus>,

    /// Trigger channel shared with the touch and wake word sources
    pub triggers: TriggerSender,

    /// Commands applied by the orchestrator between cycles
    pub control: mpsc::Sender<ControlCommand>,
}

/// Build the API router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(status::router(Arc::clone(&state)))
        .nest("/actions", actions::router(state))
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: Arc<ApiState>, host: String, port: u16) -> Self {
        Self { state, host, port }
    }

    /// Run the API server until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind status API on {addr}: {e}")))?;

        tracing::info!(addr = %addr, "status API listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Config(format!("status API error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task, logging failures
    #[must_use]
    pub fn spawn<F>(self, shutdown: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = self.run(shutdown).await {
                tracing::error!(error = %e, "status API stopped");
            }
        })
    }
}
