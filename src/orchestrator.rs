//! Interaction state machine
//!
//! One trigger runs one cycle:
//!
//! ```text
//! Ambient ─trigger─▶ Listening ─recorded─▶ Processing ─reply─▶ Speaking ─done─▶ Ambient
//!                                               │
//!                                               └─ stop / reset / empty ─▶ Ambient
//! any failure ─▶ Error ─▶ Ambient
//! ```
//!
//! Cycles never overlap. Triggers that arrive during a cycle are discarded
//! when it ends, so a touch mid-reply does not queue another interaction.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::ambient::Ambient;
use crate::config::Config;
use crate::conversation::ConversationBuffer;
use crate::input::TriggerReceiver;
use crate::provider::{AiProvider, ChatMessage, Role};
use crate::state::{OrbState, OrbStatus};
use crate::voice::{Envelope, Playback, Recorder};
use crate::Result;

/// Pause after a failed cycle before accepting the next trigger
pub const ERROR_COOLDOWN: Duration = Duration::from_millis(300);

/// How often the speaking level follows the reply envelope
const LEVEL_TICK: Duration = Duration::from_millis(50);

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A reply was spoken
    Replied,
    /// The stop keyword was heard
    StopPhrase,
    /// A reset phrase was heard
    ResetPhrase,
    /// Nothing intelligible was said
    EmptyTranscript,
    /// A step failed and the error path ran
    Failed,
}

/// Requests handled between cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Forget conversation history
    ResetConversation,
}

/// Runs interaction cycles
pub struct Orchestrator {
    config: Config,
    status: Arc<OrbStatus>,
    recorder: Box<dyn Recorder>,
    ai: Arc<dyn AiProvider>,
    playback: Arc<dyn Playback>,
    ambient: Box<dyn Ambient>,
    conversation: ConversationBuffer,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        config: Config,
        status: Arc<OrbStatus>,
        recorder: Box<dyn Recorder>,
        ai: Arc<dyn AiProvider>,
        playback: Arc<dyn Playback>,
        ambient: Box<dyn Ambient>,
    ) -> Self {
        let conversation = ConversationBuffer::new(
            config.conversation.max_turns,
            config.conversation.reset_timeout,
        );
        Self {
            config,
            status,
            recorder,
            ai,
            playback,
            ambient,
            conversation,
        }
    }

    /// Wait for triggers and run cycles until shutdown
    pub async fn run(
        &mut self,
        triggers: &mut TriggerReceiver,
        control: &mut mpsc::Receiver<ControlCommand>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) {
        self.status.set_state(OrbState::Ambient);
        tracing::info!("orb is running, waiting for a trigger");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                Some(command) = control.recv() => self.apply(command),
                trigger = triggers.recv() => {
                    let Some(trigger) = trigger else {
                        tracing::warn!("trigger sources closed");
                        break;
                    };
                    tracing::debug!(kind = ?trigger.kind, "starting interaction");
                    let outcome = self.run_cycle().await;
                    tracing::debug!(?outcome, "interaction finished");

                    let mut discarded = 0;
                    while triggers.try_recv().is_ok() {
                        discarded += 1;
                    }
                    if discarded > 0 {
                        tracing::debug!(discarded, "dropped triggers received mid-cycle");
                    }
                }
            }
        }
    }

    /// Apply a between-cycle command
    pub fn apply(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::ResetConversation => {
                self.conversation.reset(Instant::now());
                tracing::info!("conversation reset on request");
            }
        }
    }

    /// Run one full interaction; failures are handled here
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        match self.interact().await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.recover(&e.to_string()).await;
                CycleOutcome::Failed
            }
        }
    }

    async fn interact(&mut self) -> Result<CycleOutcome> {
        if self.config.conversation.enabled {
            self.conversation.maybe_reset_for_inactivity(Instant::now());
        }

        self.ambient.fade_to(self.config.ambient.volume_ducked).await;
        self.play_chime(&self.config.paths.glass_chime).await;
        self.status.set_state(OrbState::Listening);

        let recording = self.recorder.record().await?;

        self.status.set_state(OrbState::Processing);
        let transcript = self
            .ai
            .transcribe(recording.path(), &self.config.models.transcribe)
            .await;
        drop(recording);
        let transcript = transcript?;

        tracing::info!(
            transcript = if transcript.is_empty() { "<empty>" } else { transcript.as_str() },
            "transcript"
        );
        self.status.set_last_transcript(&transcript);

        let lowered = transcript.to_lowercase();
        if lowered.contains(&self.config.stop_keyword.to_lowercase()) {
            tracing::info!("stop keyword detected, returning to ambient");
            self.return_to_ambient(true).await;
            return Ok(CycleOutcome::StopPhrase);
        }

        if self
            .config
            .conversation
            .reset_phrases
            .iter()
            .any(|phrase| lowered.contains(&phrase.to_lowercase()))
        {
            tracing::info!("reset phrase detected, conversation cleared");
            self.return_to_ambient(true).await;
            return Ok(CycleOutcome::ResetPhrase);
        }

        if transcript.trim().is_empty() {
            tracing::info!("empty transcript, returning to ambient");
            self.return_to_ambient(false).await;
            return Ok(CycleOutcome::EmptyTranscript);
        }

        let messages = if self.config.conversation.enabled {
            self.conversation
                .build_messages(&self.config.chat_system_prompt, &transcript)
        } else {
            vec![
                ChatMessage::new(Role::System, self.config.chat_system_prompt.as_str()),
                ChatMessage::new(Role::User, transcript.as_str()),
            ]
        };

        let reply = self.ai.chat(&messages, &self.config.models.chat).await?;
        tracing::info!(reply = reply.text(), fallback = reply.is_fallback(), "assistant reply");
        self.status.set_last_reply(reply.text());

        if self.config.conversation.enabled
            && (!reply.is_fallback() || self.config.conversation.persist_fallback_replies)
        {
            self.conversation
                .add_turn(&transcript, reply.text(), Instant::now());
        }

        let speech = self
            .ai
            .synthesize(
                reply.text(),
                &self.config.models.tts,
                &self.config.paths.tts_output,
            )
            .await?;

        self.status.set_state(OrbState::Speaking);
        let spoken = self.speak(&speech).await;
        discard_reply(&speech).await;
        spoken?;

        self.ambient.fade_to(self.config.ambient.volume_normal).await;
        self.status.set_state(OrbState::Ambient);
        self.status.set_last_error(None);
        Ok(CycleOutcome::Replied)
    }

    /// Play the reply while the speaking level follows its envelope
    async fn speak(&self, path: &Path) -> Result<()> {
        let envelope = Envelope::from_file(path)?;
        let playback = Arc::clone(&self.playback);
        let play = playback.play_blocking(path);
        tokio::pin!(play);

        let started = Instant::now();
        let mut ticker = tokio::time::interval(LEVEL_TICK);
        let result = loop {
            tokio::select! {
                result = &mut play => break result,
                _ = ticker.tick() => {
                    self.status.set_speaking_level(envelope.level_at(started.elapsed()));
                }
            }
        };

        self.status.set_speaking_level(0.0);
        result
    }

    /// Down chime, restore volume, back to ambient
    async fn return_to_ambient(&mut self, reset_conversation: bool) {
        self.play_chime(&self.config.paths.down_chime).await;
        self.ambient.fade_to(self.config.ambient.volume_normal).await;
        if reset_conversation {
            self.conversation.reset(Instant::now());
        }
        self.status.set_state(OrbState::Ambient);
    }

    async fn recover(&mut self, error: &str) {
        tracing::error!(error, "interaction failed");
        self.status.set_last_error(Some(error.to_string()));
        self.status.set_state(OrbState::Error);
        self.status.set_speaking_level(0.0);

        self.play_chime(&self.config.paths.down_chime).await;
        discard_reply(&self.config.paths.tts_output).await;
        self.ambient.fade_to(self.config.ambient.volume_normal).await;
        self.status.set_state(OrbState::Ambient);

        tokio::time::sleep(ERROR_COOLDOWN).await;
    }

    async fn play_chime(&self, path: &Path) {
        if let Err(e) = self.playback.play_blocking(path).await {
            tracing::warn!(path = %path.display(), error = %e, "chime playback failed");
        }
    }

    /// Stop the ambient soundtrack
    pub async fn shutdown(&mut self) {
        self.ambient.stop().await;
    }

    #[must_use]
    pub const fn conversation(&self) -> &ConversationBuffer {
        &self.conversation
    }

    #[must_use]
    pub fn status(&self) -> &OrbStatus {
        &self.status
    }
}

/// Remove a synthesized reply once it has been played
async fn discard_reply(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove reply audio"),
    }
}
