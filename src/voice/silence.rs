//! Adaptive end-of-utterance detection
//!
//! The first second of every recording calibrates a noise floor. After that,
//! frames quieter than `floor * multiplier` count as silence, and enough
//! consecutive silence ends the recording. A hard cap on captured audio
//! always wins.

use super::CaptureSettings;

/// Audio time spent estimating the noise floor
pub const CALIBRATE_SECONDS: f64 = 1.0;

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Trailing silence reached `silence_seconds`
    Silence,
    /// Captured audio reached `max_seconds`
    MaxDuration,
}

/// Root mean square of a mono frame
///
/// A small bias keeps the result positive for digital silence.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn frame_rms(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return 1e-6;
    }
    let sum: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / frame.len() as f64 + 1e-12).sqrt()
}

/// Per-recording silence state
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    sample_rate: f64,
    silence_seconds: f64,
    multiplier: f64,
    max_samples: u64,
    threshold: Option<f64>,
    samples_seen: u64,
    silent_samples: u64,
}

impl SilenceDetector {
    /// Create a detector for one recording
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(settings: &CaptureSettings) -> Self {
        let sample_rate = f64::from(settings.sample_rate);
        let max_samples = (settings.max_seconds * sample_rate).floor().max(1.0) as u64;
        Self {
            sample_rate,
            silence_seconds: settings.silence_seconds,
            multiplier: settings.threshold_multiplier,
            max_samples,
            threshold: None,
            samples_seen: 0,
            silent_samples: 0,
        }
    }

    /// Samples that may still be captured before the cap
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn remaining_samples(&self) -> usize {
        self.max_samples.saturating_sub(self.samples_seen) as usize
    }

    /// Audio time observed so far
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn elapsed_seconds(&self) -> f64 {
        self.samples_seen as f64 / self.sample_rate
    }

    /// Calibrated noise floor, if any frame has been seen
    #[must_use]
    pub const fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Feed one mono frame; returns `Some` when recording should stop
    #[allow(clippy::cast_precision_loss)]
    pub fn observe(&mut self, frame: &[f32]) -> Option<StopReason> {
        let rms = frame_rms(frame);
        self.samples_seen += frame.len() as u64;
        let elapsed = self.elapsed_seconds();

        if elapsed <= CALIBRATE_SECONDS {
            self.threshold = Some(self.threshold.map_or(rms, |t| 0.9f64.mul_add(t, 0.1 * rms)));
        } else {
            let floor = *self.threshold.get_or_insert(rms);
            if rms < floor * self.multiplier {
                self.silent_samples += frame.len() as u64;
            } else {
                self.silent_samples = 0;
            }
        }

        if self.samples_seen >= self.max_samples {
            tracing::debug!(elapsed, "recording stopped: max duration reached");
            return Some(StopReason::MaxDuration);
        }

        let silent_for = self.silent_samples as f64 / self.sample_rate;
        if elapsed > CALIBRATE_SECONDS && silent_for >= self.silence_seconds {
            tracing::debug!(elapsed, silent_for, "recording stopped: silence detected");
            return Some(StopReason::Silence);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(silence_seconds: f64, max_seconds: f64) -> CaptureSettings {
        CaptureSettings {
            sample_rate: 16_000,
            channels: 1,
            frame_size: 1024,
            silence_seconds,
            max_seconds,
            threshold_multiplier: 1.8,
        }
    }

    #[test]
    fn rms_of_silence_is_tiny_but_positive() {
        let rms = frame_rms(&[0.0; 256]);
        assert!(rms > 0.0);
        assert!(rms < 1e-5);
    }

    #[test]
    fn rms_of_constant_signal() {
        let rms = frame_rms(&[0.5; 100]);
        assert!((rms - 0.5).abs() < 1e-6);
    }

    #[test]
    fn never_stops_for_silence_during_calibration() {
        let mut detector = SilenceDetector::new(&settings(0.1, 30.0));
        // 15 frames of 64ms = 0.96s, all inside calibration
        for _ in 0..15 {
            assert_eq!(detector.observe(&[0.0; 1024]), None);
        }
        assert!(detector.threshold().is_some());
    }

    #[test]
    fn constant_quiet_input_stops_after_calibration_plus_silence() {
        let mut detector = SilenceDetector::new(&settings(1.0, 30.0));
        let mut frames = 0;
        let reason = loop {
            frames += 1;
            if let Some(reason) = detector.observe(&[0.001; 1024]) {
                break reason;
            }
        };

        // 15 calibration frames, then 16 silent frames (1.024s >= 1.0s)
        assert_eq!(reason, StopReason::Silence);
        assert_eq!(frames, 31);
    }

    #[test]
    fn speech_resets_silence_counter() {
        let mut detector = SilenceDetector::new(&settings(0.5, 30.0));
        for _ in 0..16 {
            assert_eq!(detector.observe(&[0.001; 1024]), None);
        }
        // Six quiet frames (0.384s), then a loud one
        for _ in 0..6 {
            assert_eq!(detector.observe(&[0.001; 1024]), None);
        }
        assert_eq!(detector.observe(&[0.5; 1024]), None);
        // Counter restarted: another seven frames are needed
        for _ in 0..7 {
            assert_eq!(detector.observe(&[0.001; 1024]), None);
        }
        assert_eq!(detector.observe(&[0.001; 1024]), Some(StopReason::Silence));
    }

    #[test]
    fn max_duration_wins_over_loud_input() {
        let mut detector = SilenceDetector::new(&settings(1.0, 2.0));
        let mut observed = 0;
        loop {
            let budget = detector.remaining_samples().min(1024);
            observed += budget;
            if let Some(reason) = detector.observe(&vec![0.8; budget]) {
                assert_eq!(reason, StopReason::MaxDuration);
                break;
            }
        }
        assert_eq!(observed, 32_000);
        assert!(detector.elapsed_seconds() <= 2.0);
    }
}
