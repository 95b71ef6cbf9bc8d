//! Daemon - wires the orb together and runs it until Ctrl-C

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::ambient::{Ambient, AmbientDucker};
use crate::api::{ApiServer, ApiState};
use crate::input::{self, TriggerSource};
use crate::leds::{self, LedController};
use crate::orchestrator::Orchestrator;
use crate::provider::OpenAiProvider;
use crate::state::OrbStatus;
use crate::voice::{MicRecorder, build_playback};
use crate::{Config, Error, Result};

/// How long the status API gets to finish in-flight requests
const API_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Pending between-cycle commands
const CONTROL_QUEUE: usize = 8;

/// The orb daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start every subsystem, run interactions until Ctrl-C, then shut down
    ///
    /// # Errors
    ///
    /// Returns error if `mpv` or the API key is missing, or the ambient
    /// player fails to start
    pub async fn run(self) -> Result<()> {
        let config = self.config;

        let mpv = which::which("mpv")
            .map_err(|_| Error::Config("mpv not found on PATH".to_string()))?;
        tracing::debug!(path = %mpv.display(), "found mpv");

        let api_key = config.require_api_key()?;

        if let Some(parent) = config.paths.tts_output.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let status = Arc::new(OrbStatus::new(config.dry_run));
        if config.dry_run {
            tracing::info!("dry run: keyboard input, LED frames are logged only");
        }

        let leds = LedController::new(
            &config.leds,
            Arc::clone(&status),
            leds::build_strip(&config.leds, config.dry_run),
        )
        .start();

        let (trigger_tx, mut trigger_rx) = input::trigger_channel();
        let mut sources = input::build_trigger_sources(&config);
        for source in &mut sources {
            match source.start(trigger_tx.clone()) {
                Ok(()) => tracing::info!(source = source.name(), "trigger source started"),
                Err(e) => {
                    tracing::error!(source = source.name(), error = %e, "trigger source failed to start");
                }
            }
        }

        let mut ambient = AmbientDucker::mpv(&config.paths, &config.ambient, Arc::clone(&status));
        if let Err(e) = ambient.start().await {
            stop_sources(&mut sources);
            leds.stop().await;
            return Err(e);
        }
        tracing::info!(path = %config.paths.ambient_loop.display(), "ambient loop started");

        let (control_tx, mut control_rx) = mpsc::channel(CONTROL_QUEUE);

        let api = if config.web.enabled {
            let state = Arc::new(ApiState {
                status: Arc::clone(&status),
                triggers: trigger_tx.clone(),
                control: control_tx,
            });
            let (stop_tx, stop_rx) = oneshot::channel::<()>();
            let server = ApiServer::new(state, config.web.host.clone(), config.web.port);
            let handle = server.spawn(async move {
                let _ = stop_rx.await;
            });
            Some((stop_tx, handle))
        } else {
            drop(control_tx);
            None
        };

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let provider = OpenAiProvider::new(
            api_key,
            config.openai.base_url.clone(),
            config.models.tts_voice.clone(),
        );
        let mut orchestrator = Orchestrator::new(
            config.clone(),
            Arc::clone(&status),
            Box::new(MicRecorder::new(config.capture.clone())),
            Arc::new(provider),
            build_playback(config.playback),
            Box::new(ambient),
        );

        orchestrator
            .run(&mut trigger_rx, &mut control_rx, &mut shutdown_rx)
            .await;

        tracing::info!("shutting down");
        stop_sources(&mut sources);
        orchestrator.shutdown().await;

        if let Some((stop_tx, mut handle)) = api {
            let _ = stop_tx.send(());
            if tokio::time::timeout(API_SHUTDOWN_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("status API did not stop in time");
                handle.abort();
            }
        }

        leds.stop().await;
        tracing::info!("orb stopped");
        Ok(())
    }
}

fn stop_sources(sources: &mut [Box<dyn TriggerSource>]) {
    for source in sources {
        source.stop();
        tracing::debug!(source = source.name(), "trigger source stopped");
    }
}
