//! Configuration management for the orb
//!
//! Values come from the config file, with a few environment overrides
//! (`OPENAI_API_KEY`, `OPENAI_BASE_URL`, `ORB_DRY_RUN`, `ORB_WEB_PORT`).

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use self::file::OrbConfigFile;
use crate::voice::CaptureSettings;
use crate::{Error, Result};

/// Default OpenAI-compatible API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Validated orb configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Phrase that ends an interaction without a reply
    pub stop_keyword: String,

    /// System prompt sent with every chat request
    pub chat_system_prompt: String,

    /// Ambient loop settings
    pub ambient: AmbientConfig,

    /// Microphone capture settings
    pub capture: CaptureSettings,

    /// Touch pad settings
    pub touch: TouchConfig,

    /// LED ring settings
    pub leds: LedConfig,

    /// Model identifiers
    pub models: ModelConfig,

    /// File locations
    pub paths: PathConfig,

    /// Simulate hardware with the keyboard and a logging LED strip
    pub dry_run: bool,

    pub wake_word: WakeWordConfig,

    pub conversation: ConversationConfig,

    pub web: WebConfig,

    /// Reply playback backend
    pub playback: PlaybackBackend,

    /// AI provider credentials
    pub openai: OpenAiConfig,
}

/// Ambient loop volume and fade settings
#[derive(Debug, Clone)]
pub struct AmbientConfig {
    pub volume_normal: u8,
    pub volume_ducked: u8,
    pub fade_step: u8,
    pub fade_interval: Duration,
}

/// Touch pad settings
#[derive(Debug, Clone)]
pub struct TouchConfig {
    /// BCM pin number
    pub gpio_pin: u32,

    /// Minimum time between two accepted touches
    pub bounce: Duration,
}

/// LED ring settings
#[derive(Debug, Clone)]
pub struct LedConfig {
    pub count: u32,
    pub pin: u32,
    /// Global brightness (0.0 - 1.0)
    pub brightness: f64,
    pub dma: u32,
    pub freq_hz: u32,
    pub invert: bool,
}

/// Model identifiers for the AI calls
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub transcribe: String,
    pub chat: String,
    pub tts: String,
    pub tts_voice: String,
}

/// Asset and runtime file locations
#[derive(Debug, Clone)]
pub struct PathConfig {
    pub ambient_loop: PathBuf,
    pub glass_chime: PathBuf,
    pub down_chime: PathBuf,
    pub tts_output: PathBuf,
    pub mpv_socket: PathBuf,
}

/// Wake word detection engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeWordEngine {
    /// Typed keyword on stdin
    Keyboard,
    /// On-device detector (not bundled; resolves to a null source)
    Native,
}

/// Wake word trigger configuration
#[derive(Debug, Clone)]
pub struct WakeWordConfig {
    pub enabled: bool,
    pub keyword: String,
    pub engine: WakeWordEngine,
    /// Keep the touch pad active alongside the wake word
    pub allow_touch: bool,
}

/// Multi-turn conversation configuration
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub enabled: bool,
    pub max_turns: usize,
    /// Idle time after which history is dropped
    pub reset_timeout: Option<Duration>,
    /// Phrases that clear history instead of asking the assistant
    pub reset_phrases: Vec<String>,
    /// Record fallback replies as assistant turns
    pub persist_fallback_replies: bool,
}

/// Status API configuration
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

/// Reply playback backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackBackend {
    /// `mpv` subprocess
    Mpv,
    /// In-process decode and cpal output
    Native,
}

/// AI provider credentials
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key from `OPENAI_API_KEY`
    pub api_key: Option<SecretString>,

    /// API base URL
    pub base_url: String,
}

impl Config {
    /// Load configuration from a file and apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or fails validation
    pub fn load(path: &Path) -> Result<Self> {
        let raw = file::load_config_file(path)?;
        let mut config = Self::from_file(raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Validate a parsed configuration file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a required key is missing or out of range
    #[allow(clippy::too_many_lines)]
    pub fn from_file(raw: OrbConfigFile) -> Result<Self> {
        let volume_normal = volume(
            "ambient_volume_normal",
            required("ambient_volume_normal", raw.ambient_volume_normal)?,
        )?;
        let volume_ducked = volume(
            "ambient_volume_ducked",
            required("ambient_volume_ducked", raw.ambient_volume_ducked)?,
        )?;

        let brightness = required("led_brightness", raw.led_brightness)?;
        if !(0.0..=1.0).contains(&brightness) {
            return Err(Error::Config(
                "led_brightness must be between 0.0 and 1.0".to_string(),
            ));
        }

        let silence_seconds = positive(
            "silence_seconds",
            required("silence_seconds", raw.silence_seconds)?,
        )?;
        let max_seconds = positive(
            "max_record_seconds",
            required("max_record_seconds", raw.max_record_seconds)?,
        )?;
        let threshold_multiplier = positive(
            "silence_threshold_multiplier",
            raw.silence_threshold_multiplier.unwrap_or(1.8),
        )?;

        let sample_rate = raw.record_sample_rate.unwrap_or(16_000);
        let channels = raw.record_channels.unwrap_or(1);
        let frame_size = raw.record_blocksize.unwrap_or(1024);
        if sample_rate == 0 || channels == 0 || frame_size == 0 {
            return Err(Error::Config(
                "record_sample_rate, record_channels and record_blocksize must be positive"
                    .to_string(),
            ));
        }

        let fade_step = u8::try_from(raw.ambient_fade_step.unwrap_or(1).clamp(1, 100)).unwrap_or(1);
        let fade_interval = seconds(
            "ambient_fade_interval",
            raw.ambient_fade_interval.unwrap_or(0.08),
        )?;

        let models = required("models", raw.models)?;
        let models = ModelConfig {
            transcribe: required("models.transcribe", models.transcribe)?,
            chat: required("models.chat", models.chat)?,
            tts: required("models.tts", models.tts)?,
            tts_voice: models.tts_voice.unwrap_or_else(|| "alloy".to_string()),
        };

        let paths = required("paths", raw.paths)?;
        let paths = PathConfig {
            ambient_loop: required("paths.ambient_loop", paths.ambient_loop)?,
            glass_chime: required("paths.glass_chime", paths.glass_chime)?,
            down_chime: required("paths.down_chime", paths.down_chime)?,
            tts_output: required("paths.tts_output", paths.tts_output)?,
            mpv_socket: required("paths.mpv_socket", paths.mpv_socket)?,
        };

        let engine = match raw.wake_word.engine.as_deref().unwrap_or("keyboard") {
            "keyboard" | "mock" => WakeWordEngine::Keyboard,
            "native" => WakeWordEngine::Native,
            other => {
                tracing::warn!(engine = other, "unknown wake word engine, treating as native");
                WakeWordEngine::Native
            }
        };
        let wake_word = WakeWordConfig {
            enabled: raw.wake_word.enabled.unwrap_or(false),
            keyword: raw
                .wake_word
                .keyword
                .unwrap_or_else(|| "hey orb".to_string()),
            engine,
            allow_touch: raw.wake_word.allow_touch.unwrap_or(true),
        };

        let conversation = ConversationConfig {
            enabled: raw.conversation.enabled.unwrap_or(true),
            max_turns: raw.conversation.max_turns.unwrap_or(6),
            reset_timeout: raw
                .conversation
                .reset_timeout_seconds
                .map(|s| seconds("conversation.reset_timeout_seconds", s))
                .transpose()?,
            reset_phrases: raw
                .conversation
                .reset_phrases
                .unwrap_or_else(|| vec!["reset conversation".to_string()])
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .collect(),
            persist_fallback_replies: raw.conversation.persist_fallback_replies.unwrap_or(true),
        };
        if conversation.enabled && conversation.max_turns == 0 {
            return Err(Error::Config(
                "conversation.max_turns must be at least 1".to_string(),
            ));
        }

        let playback = match raw.playback.backend.as_deref().unwrap_or("mpv") {
            "mpv" => PlaybackBackend::Mpv,
            "native" => PlaybackBackend::Native,
            other => {
                return Err(Error::Config(format!("unknown playback.backend: {other}")));
            }
        };

        let stop_keyword = required("stop_keyword", raw.stop_keyword)?;
        if stop_keyword.trim().is_empty() {
            return Err(Error::Config("stop_keyword must not be empty".to_string()));
        }

        Ok(Self {
            stop_keyword,
            chat_system_prompt: required("chat_system_prompt", raw.chat_system_prompt)?,
            ambient: AmbientConfig {
                volume_normal,
                volume_ducked,
                fade_step,
                fade_interval,
            },
            capture: CaptureSettings {
                sample_rate,
                channels,
                frame_size,
                silence_seconds,
                max_seconds,
                threshold_multiplier,
            },
            touch: TouchConfig {
                gpio_pin: required("gpio_pin_touch", raw.gpio_pin_touch)?,
                bounce: seconds(
                    "touch_bounce_seconds",
                    raw.touch_bounce_seconds.unwrap_or(0.25),
                )?,
            },
            leds: LedConfig {
                count: required("led_count", raw.led_count)?,
                pin: required("led_pin", raw.led_pin)?,
                brightness,
                dma: raw.led_dma.unwrap_or(10),
                freq_hz: raw.led_freq_hz.unwrap_or(800_000),
                invert: raw.led_invert.unwrap_or(false),
            },
            models,
            paths,
            dry_run: raw.dry_run.enabled.unwrap_or(false),
            wake_word,
            conversation,
            web: WebConfig {
                enabled: raw.web.enabled.unwrap_or(false),
                host: raw.web.host.unwrap_or_else(|| "127.0.0.1".to_string()),
                port: raw.web.port.unwrap_or(8080),
            },
            playback,
            openai: OpenAiConfig {
                api_key: None,
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            },
        })
    }

    /// Apply environment overrides on top of file values
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY")
            && !key.is_empty()
        {
            self.openai.api_key = Some(SecretString::from(key));
        }

        if let Ok(url) = std::env::var("OPENAI_BASE_URL")
            && !url.is_empty()
        {
            self.openai.base_url = url.trim_end_matches('/').to_string();
        }

        if std::env::var("ORB_DRY_RUN").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
            self.dry_run = true;
        }

        if let Some(port) = std::env::var("ORB_WEB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.web.port = port;
        }
    }

    /// The API key, or a configuration error when unset
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `OPENAI_API_KEY` was not provided
    pub fn require_api_key(&self) -> Result<SecretString> {
        self.openai
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))
    }
}

fn required<T>(key: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::Config(format!("config.{key} missing")))
}

fn volume(key: &str, value: i64) -> Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| Error::Config(format!("{key} must be between 0 and 100")))
}

fn positive(key: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::Config(format!("{key} must be positive")))
    }
}

fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative number of seconds")))
}
