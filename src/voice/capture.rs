//! Audio capture from microphone
//!
//! Frames are down-mixed to mono, streamed into a temporary WAV file and fed
//! to a [`SilenceDetector`] until it asks to stop. The file is deleted if
//! anything fails before the recording is finalized.

use std::io::BufWriter;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tempfile::TempPath;

use super::silence::{SilenceDetector, StopReason};
use crate::{Error, Result};

/// How long the input stream may go without delivering data
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Parameters for one recording
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per analysis frame (after down-mixing)
    pub frame_size: usize,
    /// Trailing silence that ends the recording
    pub silence_seconds: f64,
    /// Hard cap on captured audio
    pub max_seconds: f64,
    /// Multiplier applied to the calibrated noise floor
    pub threshold_multiplier: f64,
}

/// A finished recording on disk
///
/// The file is removed when the value is dropped.
#[derive(Debug)]
pub struct Recording {
    path: TempPath,
    seconds: f64,
}

impl Recording {
    /// Wrap an existing temporary file
    #[must_use]
    pub const fn new(path: TempPath, seconds: f64) -> Self {
        Self { path, seconds }
    }

    /// Location of the WAV file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the recorded audio
    #[must_use]
    pub const fn seconds(&self) -> f64 {
        self.seconds
    }
}

/// Produces interleaved sample chunks of arbitrary length
pub trait FrameSource {
    /// Block until the next chunk is available
    ///
    /// # Errors
    ///
    /// Returns error if the underlying stream fails or stalls
    fn next_chunk(&mut self) -> Result<Vec<f32>>;
}

/// Records one utterance
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Record until silence or the duration cap
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or the file cannot be written
    async fn record(&self) -> Result<Recording>;
}

/// Average interleaved channels into mono
#[must_use]
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let channels = usize::from(channels);
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Capture from `source` into a temporary WAV file until the detector stops
///
/// # Errors
///
/// Returns error if the source fails or the file cannot be written; any
/// partially written file is removed first
pub fn record_from_source<S: FrameSource + ?Sized>(
    source: &mut S,
    settings: &CaptureSettings,
) -> Result<(Recording, StopReason)> {
    record_from_source_in(source, settings, &std::env::temp_dir())
}

/// Like [`record_from_source`], with the WAV file created inside `dir`
///
/// # Errors
///
/// Returns error if the source fails or the file cannot be written; any
/// partially written file is removed first
#[allow(clippy::cast_precision_loss)]
pub fn record_from_source_in<S: FrameSource + ?Sized>(
    source: &mut S,
    settings: &CaptureSettings,
    dir: &Path,
) -> Result<(Recording, StopReason)> {
    let file = tempfile::Builder::new()
        .prefix("orb_record_")
        .suffix(".wav")
        .tempfile_in(dir)?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: settings.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(BufWriter::new(file.reopen()?), spec)
        .map_err(|e| Error::Capture(e.to_string()))?;

    let frame_size = settings.frame_size.max(1);
    let mut detector = SilenceDetector::new(settings);
    let mut pending: Vec<f32> = Vec::with_capacity(frame_size * 2);
    let mut written: usize = 0;

    tracing::info!("recording started");

    let reason = loop {
        if pending.len() < frame_size {
            let chunk = source.next_chunk()?;
            pending.extend(downmix(&chunk, settings.channels));
            continue;
        }

        let take = frame_size.min(detector.remaining_samples()).max(1);
        let frame: Vec<f32> = pending.drain(..take).collect();

        for &sample in &frame {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Capture(e.to_string()))?;
        }
        written += frame.len();

        if let Some(reason) = detector.observe(&frame) {
            break reason;
        }
    };

    writer
        .finalize()
        .map_err(|e| Error::Capture(e.to_string()))?;

    let seconds = written as f64 / f64::from(settings.sample_rate);
    let path = file.into_temp_path();
    tracing::info!(
        path = %path.display(),
        seconds,
        reason = ?reason,
        "recording saved"
    );

    Ok((Recording::new(path, seconds), reason))
}

/// Microphone input via the default cpal input device
pub struct MicSource {
    _stream: Stream,
    chunks: mpsc::Receiver<std::result::Result<Vec<f32>, String>>,
}

impl MicSource {
    /// Open the default input device and start streaming
    ///
    /// # Errors
    ///
    /// Returns error if no device supports the requested format
    pub fn open(settings: &CaptureSettings) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Capture("no input device available".to_string()))?;

        let rate = SampleRate(settings.sample_rate);
        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Capture(e.to_string()))?
            .find(|c| {
                c.channels() == settings.channels
                    && c.min_sample_rate() <= rate
                    && c.max_sample_rate() >= rate
            })
            .ok_or_else(|| Error::Capture("no suitable audio config found".to_string()))?;

        let config: StreamConfig = supported_config.with_sample_rate(rate).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = settings.sample_rate,
            channels = config.channels,
            "audio capture initialized"
        );

        let (tx, rx) = mpsc::channel();
        let err_tx = tx.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(Ok(data.to_vec()));
                },
                move |err| {
                    tracing::error!(error = %err, "audio capture error");
                    let _ = err_tx.send(Err(err.to_string()));
                },
                None,
            )
            .map_err(|e| Error::Capture(e.to_string()))?;

        stream.play().map_err(|e| Error::Capture(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            chunks: rx,
        })
    }
}

impl FrameSource for MicSource {
    fn next_chunk(&mut self) -> Result<Vec<f32>> {
        match self.chunks.recv_timeout(STALL_TIMEOUT) {
            Ok(Ok(chunk)) => Ok(chunk),
            Ok(Err(e)) => Err(Error::Capture(e)),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(Error::Capture("input stream stalled".to_string()))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::Capture("input stream closed".to_string()))
            }
        }
    }
}

/// Records from the default microphone
pub struct MicRecorder {
    settings: CaptureSettings,
}

impl MicRecorder {
    #[must_use]
    pub const fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Recorder for MicRecorder {
    async fn record(&self) -> Result<Recording> {
        let settings = self.settings.clone();
        // cpal streams are not Send; keep the whole capture on one blocking thread
        tokio::task::spawn_blocking(move || {
            let mut source = MicSource::open(&settings)?;
            record_from_source(&mut source, &settings).map(|(recording, _)| recording)
        })
        .await
        .map_err(|e| Error::Capture(format!("capture task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        chunks: Vec<Vec<f32>>,
        fail_after: Option<usize>,
        served: usize,
    }

    impl FrameSource for Scripted {
        fn next_chunk(&mut self) -> Result<Vec<f32>> {
            if self.fail_after.is_some_and(|n| self.served >= n) {
                return Err(Error::Capture("device unplugged".to_string()));
            }
            self.served += 1;
            Ok(self
                .chunks
                .get(self.served - 1)
                .cloned()
                .unwrap_or_else(|| vec![0.0; 700]))
        }
    }

    fn settings() -> CaptureSettings {
        CaptureSettings {
            sample_rate: 16_000,
            channels: 2,
            frame_size: 1024,
            silence_seconds: 0.5,
            max_seconds: 1.5,
            threshold_multiplier: 1.8,
        }
    }

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.25, -0.25], 1), vec![0.25, -0.25]);
    }

    #[test]
    fn writes_mono_wav_within_cap() {
        let mut source = Scripted {
            chunks: vec![vec![0.4; 3000]; 50],
            fail_after: None,
            served: 0,
        };
        let (recording, reason) = record_from_source(&mut source, &settings()).unwrap();

        assert_eq!(reason, StopReason::MaxDuration);
        assert!(recording.seconds() <= 1.5);

        let reader = hound::WavReader::open(recording.path()).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), 24_000);
        assert!(
            recording
                .path()
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("orb_record_")
        );
    }

    #[test]
    fn dropping_recording_removes_file() {
        let mut source = Scripted {
            chunks: Vec::new(),
            fail_after: None,
            served: 0,
        };
        let (recording, _) = record_from_source(&mut source, &settings()).unwrap();
        let path = recording.path().to_path_buf();
        assert!(path.exists());
        drop(recording);
        assert!(!path.exists());
    }

    #[test]
    fn source_failure_is_a_capture_error() {
        let mut source = Scripted {
            chunks: Vec::new(),
            fail_after: Some(3),
            served: 0,
        };
        let err = record_from_source(&mut source, &settings()).unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
    }

    #[test]
    fn failure_mid_stream_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = Scripted {
            chunks: vec![vec![0.2; 1024]; 40],
            fail_after: Some(40),
            served: 0,
        };
        let err = record_from_source_in(&mut source, &settings(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
