//! Interaction triggers
//!
//! Sources (touch pad, keyboard, wake word) push into one bounded channel
//! of capacity 1. A trigger that arrives while another is pending is
//! dropped, so a burst of touches starts at most one interaction.

mod gpio;
mod keyboard;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub use gpio::{Debouncer, GpioTouch};
pub use keyboard::{KeyboardTouch, KeyboardWakeWord, LineFeed};

use crate::Result;
use crate::config::{Config, WakeWordEngine};

/// What produced a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Touch,
    WakeWord,
    /// Status API request
    Remote,
}

/// Request to start an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub kind: TriggerKind,
}

/// Receiving half, owned by the orchestrator
pub type TriggerReceiver = mpsc::Receiver<Trigger>;

/// Sending half, cloned into every source
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::Sender<Trigger>,
}

impl TriggerSender {
    /// Offer a trigger; returns `false` if one is already pending
    pub fn fire(&self, kind: TriggerKind) -> bool {
        match self.tx.try_send(Trigger { kind }) {
            Ok(()) => {
                tracing::info!(?kind, "trigger received");
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(?kind, "trigger already pending, dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Create the capacity-1 trigger channel
#[must_use]
pub fn trigger_channel() -> (TriggerSender, TriggerReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (TriggerSender { tx }, rx)
}

/// A background producer of triggers
pub trait TriggerSource: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Begin delivering triggers
    ///
    /// # Errors
    ///
    /// Returns error if the underlying device cannot be opened
    fn start(&mut self, triggers: TriggerSender) -> Result<()>;

    /// Stop delivering triggers
    fn stop(&mut self);
}

/// Wake word source that never fires
#[derive(Debug, Default)]
pub struct NullWakeWord;

impl TriggerSource for NullWakeWord {
    fn name(&self) -> &'static str {
        "null-wake-word"
    }

    fn start(&mut self, _triggers: TriggerSender) -> Result<()> {
        tracing::debug!("wake word detection inactive");
        Ok(())
    }

    fn stop(&mut self) {}
}

/// Touch source for the configuration
#[must_use]
pub fn build_touch_input(config: &Config) -> Box<dyn TriggerSource> {
    if config.dry_run {
        Box::new(KeyboardTouch::new(LineFeed::stdin()))
    } else {
        Box::new(GpioTouch::new(config.touch.gpio_pin, config.touch.bounce))
    }
}

/// Wake word source for the configuration
#[must_use]
pub fn build_wake_word_input(config: &Config) -> Box<dyn TriggerSource> {
    if !config.wake_word.enabled {
        return Box::new(NullWakeWord);
    }
    match config.wake_word.engine {
        WakeWordEngine::Keyboard => Box::new(KeyboardWakeWord::new(
            config.wake_word.keyword.clone(),
            LineFeed::stdin(),
        )),
        WakeWordEngine::Native => {
            tracing::warn!("native wake word engine is not available in this build");
            Box::new(NullWakeWord)
        }
    }
}

/// All sources to run: touch unless the wake word replaces it, plus wake word if enabled
#[must_use]
pub fn build_trigger_sources(config: &Config) -> Vec<Box<dyn TriggerSource>> {
    let mut sources = Vec::new();
    if !config.wake_word.enabled || config.wake_word.allow_touch {
        sources.push(build_touch_input(config));
    }
    if config.wake_word.enabled {
        sources.push(build_wake_word_input(config));
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_pending_trigger_is_dropped() {
        let (tx, mut rx) = trigger_channel();
        assert!(tx.fire(TriggerKind::Touch));
        assert!(!tx.fire(TriggerKind::WakeWord));

        assert_eq!(rx.recv().await.unwrap().kind, TriggerKind::Touch);
        assert!(rx.try_recv().is_err());

        // Slot is free again once consumed
        assert!(tx.fire(TriggerKind::Remote));
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (tx, rx) = trigger_channel();
        drop(rx);
        assert!(!tx.fire(TriggerKind::Touch));
    }
}
