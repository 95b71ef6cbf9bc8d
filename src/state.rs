//! Shared orb status
//!
//! The orchestrator is the only writer of the interaction state; the LED
//! loop and the status API read it. State and speaking level are atomics so
//! readers never block the interaction path.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use serde::Serialize;

/// Interaction state shown on the LED ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum OrbState {
    Ambient = 0,
    Listening = 1,
    Processing = 2,
    Speaking = 3,
    Error = 4,
}

impl OrbState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Listening,
            2 => Self::Processing,
            3 => Self::Speaking,
            4 => Self::Error,
            _ => Self::Ambient,
        }
    }

    /// Lowercase name used in logs and the status API
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ambient => "ambient",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for OrbState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone)]
struct Summaries {
    last_transcript: Option<String>,
    last_reply: Option<String>,
    last_error: Option<String>,
}

/// Point-in-time copy of the status
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: OrbState,
    pub ambient_running: bool,
    pub dry_run: bool,
    pub last_transcript_summary: Option<String>,
    pub last_reply_summary: Option<String>,
    pub last_error: Option<String>,
}

/// Status shared between the orchestrator, LEDs and status API
#[derive(Debug)]
pub struct OrbStatus {
    state: AtomicU8,
    speaking_level: AtomicU32,
    ambient_running: AtomicBool,
    dry_run: bool,
    summaries: Mutex<Summaries>,
}

impl OrbStatus {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            state: AtomicU8::new(OrbState::Ambient as u8),
            speaking_level: AtomicU32::new(0.0f32.to_bits()),
            ambient_running: AtomicBool::new(false),
            dry_run,
            summaries: Mutex::new(Summaries::default()),
        }
    }

    #[must_use]
    pub fn state(&self) -> OrbState {
        OrbState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: OrbState) {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        if previous != state as u8 {
            tracing::debug!(state = %state, "orb state changed");
        }
    }

    /// Current speaking amplitude in `0.0..=1.0`
    #[must_use]
    pub fn speaking_level(&self) -> f32 {
        f32::from_bits(self.speaking_level.load(Ordering::Relaxed))
    }

    /// Set the speaking amplitude, clamped to `0.0..=1.0`
    pub fn set_speaking_level(&self, level: f32) {
        let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
        self.speaking_level.store(level.to_bits(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn ambient_running(&self) -> bool {
        self.ambient_running.load(Ordering::Relaxed)
    }

    pub fn set_ambient_running(&self, running: bool) {
        self.ambient_running.store(running, Ordering::Relaxed);
    }

    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn set_last_transcript(&self, transcript: &str) {
        if let Ok(mut s) = self.summaries.lock() {
            s.last_transcript = Some(summarize_text(transcript, SUMMARY_PREVIEW_CHARS));
        }
    }

    pub fn set_last_reply(&self, reply: &str) {
        if let Ok(mut s) = self.summaries.lock() {
            s.last_reply = Some(summarize_text(reply, SUMMARY_PREVIEW_CHARS));
        }
    }

    pub fn set_last_error(&self, error: Option<String>) {
        if let Ok(mut s) = self.summaries.lock() {
            s.last_error = error;
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        let summaries = self
            .summaries
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        StatusSnapshot {
            state: self.state(),
            ambient_running: self.ambient_running(),
            dry_run: self.dry_run,
            last_transcript_summary: summaries.last_transcript,
            last_reply_summary: summaries.last_reply,
            last_error: summaries.last_error,
        }
    }
}

/// Characters of text kept in a status summary
pub const SUMMARY_PREVIEW_CHARS: usize = 80;

/// Whitespace-normalized preview of `value` with its original length
#[must_use]
pub fn summarize_text(value: &str, max_len: usize) -> String {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut preview: String = normalized.chars().take(max_len).collect();
    if normalized.chars().count() > max_len {
        preview.push('…');
    }
    format!("{preview} (chars={})", value.chars().count())
}
