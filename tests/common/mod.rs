//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ambient_orb::ambient::Ambient;
use ambient_orb::config::file::OrbConfigFile;
use ambient_orb::input::{TriggerKind, TriggerSender};
use ambient_orb::provider::{AiProvider, ChatMessage, ChatReply};
use ambient_orb::voice::{Playback, Recorder, Recording};
use ambient_orb::{Config, Error, Result};
use async_trait::async_trait;

/// Smallest valid configuration; chimes and the reply land in `dir`
pub fn config_yaml(dir: &Path) -> String {
    format!(
        r#"
stop_keyword: "stop orb"
ambient_volume_normal: 60
ambient_volume_ducked: 20
silence_seconds: 1.2
max_record_seconds: 12
gpio_pin_touch: 17
led_count: 12
led_pin: 18
led_brightness: 0.5
chat_system_prompt: "You are a calm orb."
models:
  transcribe: whisper-1
  chat: gpt-4o-mini
  tts: tts-1
paths:
  ambient_loop: {dir}/ambient.mp3
  glass_chime: {dir}/glass.wav
  down_chime: {dir}/down.wav
  tts_output: {dir}/reply.wav
  mpv_socket: {dir}/mpv.sock
"#,
        dir = dir.display()
    )
}

/// Parse `yaml` into a validated config
pub fn config_from_yaml(yaml: &str) -> Config {
    let raw: OrbConfigFile = serde_yaml::from_str(yaml).expect("test yaml parses");
    Config::from_file(raw).expect("test config is valid")
}

pub fn test_config(dir: &Path) -> Config {
    config_from_yaml(&config_yaml(dir))
}

/// Generate sine wave audio samples
pub fn generate_sine_samples(
    sample_rate: u32,
    frequency: f32,
    duration_secs: f32,
    amplitude: f32,
) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
pub fn generate_silence(sample_rate: u32, duration_secs: f32) -> Vec<f32> {
    vec![0.0; (sample_rate as f32 * duration_secs) as usize]
}

/// Write mono 16-bit PCM
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for s in samples {
        writer
            .write_sample((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

/// Recorder that hands out real temporary files
#[derive(Default)]
pub struct FakeRecorder {
    pub fail: bool,
    pub recorded: Arc<Mutex<Vec<PathBuf>>>,
    /// Fired while recording, as a touch landing mid-cycle would
    pub interrupt: Option<TriggerSender>,
    pub interrupts_accepted: Arc<Mutex<usize>>,
}

#[async_trait]
impl Recorder for FakeRecorder {
    async fn record(&self) -> Result<Recording> {
        if self.fail {
            return Err(Error::Capture("no input device".to_string()));
        }
        if let Some(triggers) = &self.interrupt
            && triggers.fire(TriggerKind::Touch)
        {
            *self.interrupts_accepted.lock().unwrap() += 1;
        }
        let file = tempfile::Builder::new()
            .prefix("orb_test_record_")
            .suffix(".wav")
            .tempfile()?;
        write_wav(file.path(), &generate_silence(16_000, 0.1), 16_000);
        let path = file.into_temp_path();
        self.recorded.lock().unwrap().push(path.to_path_buf());
        Ok(Recording::new(path, 0.1))
    }
}

/// Scripted AI provider; `None` makes the step fail
pub struct FakeAi {
    /// Heard once each, in order, before falling back to `transcript`
    pub queued: Mutex<VecDeque<String>>,
    pub transcript: Option<String>,
    pub reply: Option<ChatReply>,
    pub synthesize_ok: bool,
    /// Whether the recording existed when transcription ran
    pub audio_seen: Arc<Mutex<Vec<bool>>>,
    pub chats: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    pub spoken: Arc<Mutex<Vec<String>>>,
}

impl FakeAi {
    pub fn replying(transcript: &str, reply: &str) -> Self {
        Self {
            queued: Mutex::default(),
            transcript: Some(transcript.to_string()),
            reply: Some(ChatReply::Text(reply.to_string())),
            synthesize_ok: true,
            audio_seen: Arc::default(),
            chats: Arc::default(),
            spoken: Arc::default(),
        }
    }

    /// Hear `transcripts` first, one per cycle
    pub fn then_hear(self, transcripts: &[&str]) -> Self {
        let mut queued = VecDeque::new();
        queued.extend(transcripts.iter().map(ToString::to_string));
        Self {
            queued: Mutex::new(queued),
            ..self
        }
    }
}

#[async_trait]
impl AiProvider for FakeAi {
    async fn transcribe(&self, audio_path: &Path, _model: &str) -> Result<String> {
        self.audio_seen.lock().unwrap().push(audio_path.exists());
        if let Some(next) = self.queued.lock().unwrap().pop_front() {
            return Ok(next);
        }
        self.transcript
            .clone()
            .ok_or_else(|| Error::Provider("transcription failed: 500".to_string()))
    }

    async fn chat(&self, messages: &[ChatMessage], _model: &str) -> Result<ChatReply> {
        self.chats.lock().unwrap().push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| Error::Provider("chat failed: 500".to_string()))
    }

    async fn synthesize(&self, text: &str, _model: &str, output_path: &Path) -> Result<PathBuf> {
        if !self.synthesize_ok {
            return Err(Error::Provider("speech failed: 500".to_string()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        write_wav(
            output_path,
            &generate_sine_samples(16_000, 220.0, 0.2, 0.5),
            16_000,
        );
        Ok(output_path.to_path_buf())
    }
}

/// Playback that only records what it was asked to play
#[derive(Default)]
pub struct FakePlayback {
    pub played: Arc<Mutex<Vec<PathBuf>>>,
    pub fail: bool,
}

#[async_trait]
impl Playback for FakePlayback {
    async fn play_blocking(&self, path: &Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(Error::Playback("no output device".to_string()));
        }
        Ok(())
    }
}

/// Ambient that records every fade target
pub struct FakeAmbient {
    pub volume: u8,
    pub fades: Arc<Mutex<Vec<u8>>>,
    pub stopped: Arc<Mutex<bool>>,
}

impl FakeAmbient {
    pub fn new(volume: u8) -> Self {
        Self {
            volume,
            fades: Arc::default(),
            stopped: Arc::default(),
        }
    }
}

#[async_trait]
impl Ambient for FakeAmbient {
    async fn start(&mut self) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) {
        *self.stopped.lock().unwrap() = true;
    }

    async fn fade_to(&mut self, target: u8) {
        self.fades.lock().unwrap().push(target);
        self.volume = target;
    }

    fn volume(&self) -> u8 {
        self.volume
    }
}
