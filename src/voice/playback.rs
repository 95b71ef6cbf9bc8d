//! Audio playback to speakers
//!
//! Two backends: an `mpv` subprocess (the default, shares the player the
//! ambient loop already depends on) and an in-process cpal output.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use super::decode::decode_file;
use crate::config::PlaybackBackend;
use crate::{Error, Result};

/// Plays an audio file to completion
#[async_trait]
pub trait Playback: Send + Sync {
    /// Play `path` and return once playback has finished
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be played
    async fn play_blocking(&self, path: &Path) -> Result<()>;
}

/// Build the configured playback backend
#[must_use]
pub fn build_playback(backend: PlaybackBackend) -> Arc<dyn Playback> {
    match backend {
        PlaybackBackend::Mpv => Arc::new(MpvPlayback::default()),
        PlaybackBackend::Native => Arc::new(NativePlayback),
    }
}

/// Plays files through a short-lived `mpv` process
#[derive(Debug, Clone)]
pub struct MpvPlayback {
    binary: PathBuf,
}

impl Default for MpvPlayback {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mpv"),
        }
    }
}

impl MpvPlayback {
    /// Use a specific player binary
    #[must_use]
    pub const fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }
}

#[async_trait]
impl Playback for MpvPlayback {
    async fn play_blocking(&self, path: &Path) -> Result<()> {
        let status = tokio::process::Command::new(&self.binary)
            .args(["--no-video", "--really-quiet", "--volume=100"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| Error::Playback(format!("failed to run {}: {e}", self.binary.display())))?;

        if !status.success() {
            return Err(Error::Playback(format!(
                "player exited with {status} for {}",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), "playback complete");
        Ok(())
    }
}

/// Decodes WAV/MP3 in-process and plays through the default cpal output
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlayback;

#[async_trait]
impl Playback for NativePlayback {
    async fn play_blocking(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let audio = decode_file(&path)?;
            play_samples(&audio.samples, audio.sample_rate)
        })
        .await
        .map_err(|e| Error::Playback(format!("playback task failed: {e}")))?
    }
}

/// Play mono samples, blocking until the device has drained them
fn play_samples(samples: &[f32], sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

    let rate = SampleRate(sample_rate);
    let supports = |channels: u16| {
        device.supported_output_configs().ok().and_then(|mut configs| {
            configs.find(|c| {
                c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        })
    };
    let supported_config = supports(1)
        .or_else(|| supports(2))
        .ok_or_else(|| Error::Playback("no suitable output config found".to_string()))?;
    let config = supported_config.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    let samples: Arc<[f32]> = Arc::from(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        pos = (pos + 1).min(samples.len());
                    }
                    position.store(pos, Ordering::Relaxed);
                    if pos >= samples.len() {
                        finished.store(true, Ordering::Release);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Playback(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate.max(1));
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();
    while !finished.load(Ordering::Acquire) && start.elapsed() < timeout {
        std::thread::sleep(Duration::from_millis(50));
    }

    // Let the device flush its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    tracing::debug!(samples = samples.len(), "playback complete");
    Ok(())
}
