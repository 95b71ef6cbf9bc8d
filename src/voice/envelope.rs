//! Amplitude envelope used to drive the speaking animation

use std::path::Path;
use std::time::Duration;

use super::decode::decode_file;
use super::silence::frame_rms;
use crate::Result;

/// Number of coarse windows an envelope is split into
pub const ENVELOPE_WINDOWS: usize = 40;

/// Envelope positions advanced per second of playback
pub const LEVELS_PER_SECOND: f64 = 20.0;

/// Level reported for audio with no samples
const EMPTY_LEVEL: f32 = 0.1;

/// Gain applied to window RMS before clamping to 1.0
const GAIN: f64 = 8.0;

/// Coarse per-window loudness, each value in `0.0..=1.0`
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    levels: Vec<f32>,
}

impl Envelope {
    /// Compute the envelope of mono samples
    #[must_use]
    pub fn from_samples(samples: &[f32]) -> Self {
        let window = (samples.len() / ENVELOPE_WINDOWS).max(1);
        let levels: Vec<f32> = samples
            .chunks(window)
            .map(|chunk| {
                #[allow(clippy::cast_possible_truncation)]
                let level = (frame_rms(chunk) * GAIN).min(1.0) as f32;
                level
            })
            .collect();

        if levels.is_empty() {
            Self {
                levels: vec![EMPTY_LEVEL],
            }
        } else {
            Self { levels }
        }
    }

    /// Decode a WAV or MP3 file and compute its envelope
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be decoded
    pub fn from_file(path: &Path) -> Result<Self> {
        let audio = decode_file(path)?;
        Ok(Self::from_samples(&audio.samples))
    }

    /// Level to show after `elapsed` of playback
    ///
    /// Advances one window every 50ms and holds the last value afterwards.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn level_at(&self, elapsed: Duration) -> f32 {
        let idx = (elapsed.as_secs_f64() * LEVELS_PER_SECOND).floor() as usize;
        self.levels[idx.min(self.levels.len() - 1)]
    }

    #[must_use]
    pub fn levels(&self) -> &[f32] {
        &self.levels
    }
}
