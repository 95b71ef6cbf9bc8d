//! Ambient soundtrack control
//!
//! A looping track plays in a separate `mpv` process. The ducker lowers it
//! while the orb listens and speaks, and raises it again afterwards, with
//! gradual fades. Control failures never reach the interaction path: they
//! are logged (rate limited) and, if the player died, it is restarted once.

mod ipc;
mod process;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::NotKeyed};

pub use ipc::{ControlChannel, MpvIpc, PlayerCommand};
pub use process::{MpvProcess, PlayerProcess, STARTUP_TIMEOUT, STOP_GRACE};

use crate::Result;
use crate::config::{AmbientConfig, PathConfig};
use crate::state::OrbStatus;

/// Window within which repeated control failures are logged once
pub const FAILURE_LOG_WINDOW: Duration = Duration::from_secs(5);

/// Ambient soundtrack as seen by the orchestrator
#[async_trait]
pub trait Ambient: Send {
    /// Launch the soundtrack at the current volume
    ///
    /// # Errors
    ///
    /// Returns `Error::StartupTimeout` if the player cannot be started
    async fn start(&mut self) -> Result<()>;

    /// Stop the soundtrack
    async fn stop(&mut self);

    /// Fade to `target`, finishing exactly at it
    async fn fade_to(&mut self, target: u8);

    /// Last requested volume
    fn volume(&self) -> u8;
}

/// Logs at most one control failure per window
struct FailureLog {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl FailureLog {
    fn new(window: Duration) -> Self {
        let quota = Quota::with_period(window)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    fn should_log(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Fade settings for [`AmbientDucker`]
#[derive(Debug, Clone, Copy)]
pub struct FadeSettings {
    /// Volume units per step (at least 1)
    pub step: u8,
    /// Pause between steps
    pub interval: Duration,
}

impl From<&AmbientConfig> for FadeSettings {
    fn from(config: &AmbientConfig) -> Self {
        Self {
            step: config.fade_step,
            interval: config.fade_interval,
        }
    }
}

/// Owns the ambient player and its volume
pub struct AmbientDucker<P, C> {
    process: P,
    channel: C,
    volume: u8,
    fade: FadeSettings,
    failures: FailureLog,
    status: Arc<OrbStatus>,
}

impl AmbientDucker<MpvProcess, MpvIpc> {
    /// Ducker for an `mpv` loop configured by `paths`
    #[must_use]
    pub fn mpv(paths: &PathConfig, ambient: &AmbientConfig, status: Arc<OrbStatus>) -> Self {
        Self::new(
            MpvProcess::new(&paths.ambient_loop, &paths.mpv_socket),
            MpvIpc::new(&paths.mpv_socket),
            ambient.volume_normal,
            FadeSettings::from(ambient),
            status,
        )
    }
}

impl<P: PlayerProcess, C: ControlChannel> AmbientDucker<P, C> {
    #[must_use]
    pub fn new(
        process: P,
        channel: C,
        initial_volume: u8,
        fade: FadeSettings,
        status: Arc<OrbStatus>,
    ) -> Self {
        Self {
            process,
            channel,
            volume: initial_volume.min(100),
            fade,
            failures: FailureLog::new(FAILURE_LOG_WINDOW),
            status,
        }
    }

    /// Push one volume value, recovering from a dead player once
    ///
    /// The local volume is updated even if the player never hears about it.
    async fn push_volume(&mut self, volume: u8) {
        if let Err(first) = self.channel.send(PlayerCommand::SetVolume(volume)).await {
            let recovered = if !self.process.is_running() && self.process.source_exists() {
                self.restart(volume).await
                    && self
                        .channel
                        .send(PlayerCommand::SetVolume(volume))
                        .await
                        .is_ok()
            } else {
                false
            };

            if !recovered && self.failures.should_log() {
                tracing::warn!(volume, error = %first, "ambient volume change failed");
            }
        }
        self.volume = volume;
    }

    async fn restart(&mut self, volume: u8) -> bool {
        tracing::info!("ambient player not running, restarting");
        match self.process.start(volume).await {
            Ok(()) => {
                self.status.set_ambient_running(true);
                true
            }
            Err(e) => {
                self.status.set_ambient_running(false);
                if self.failures.should_log() {
                    tracing::warn!(error = %e, "ambient player restart failed");
                }
                false
            }
        }
    }

    /// Access the process (tests inspect fakes through this)
    pub const fn process_mut(&mut self) -> &mut P {
        &mut self.process
    }

    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }
}

#[async_trait]
impl<P: PlayerProcess, C: ControlChannel> Ambient for AmbientDucker<P, C> {
    async fn start(&mut self) -> Result<()> {
        let result = self.process.start(self.volume).await;
        self.status.set_ambient_running(result.is_ok());
        result
    }

    async fn stop(&mut self) {
        if let Err(e) = self.channel.send(PlayerCommand::Quit).await {
            tracing::debug!(error = %e, "quit command not delivered");
        }
        self.process.stop().await;
        self.status.set_ambient_running(false);
    }

    async fn fade_to(&mut self, target: u8) {
        let target = target.min(100);
        if target == self.volume {
            return;
        }

        let step = self.fade.step.max(1);
        tracing::debug!(from = self.volume, to = target, "fading ambient");

        let mut current = self.volume;
        while current != target {
            self.push_volume(current).await;
            tokio::time::sleep(self.fade.interval).await;
            current = if target > current {
                current.saturating_add(step).min(target)
            } else {
                current.saturating_sub(step).max(target)
            };
        }
        self.push_volume(target).await;
    }

    fn volume(&self) -> u8 {
        self.volume
    }
}
