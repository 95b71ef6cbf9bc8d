//! Configuration file loading
//!
//! The orb reads a single YAML document (or TOML, picked by the `.toml`
//! extension). Every field is optional at this layer; required keys and
//! ranges are checked when the file is turned into a [`super::Config`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct OrbConfigFile {
    /// Phrase that ends an interaction without a reply
    pub stop_keyword: Option<String>,

    /// Ambient loop volume while idle (0-100)
    pub ambient_volume_normal: Option<i64>,

    /// Ambient loop volume during an interaction (0-100)
    pub ambient_volume_ducked: Option<i64>,

    /// Trailing silence that ends a recording
    pub silence_seconds: Option<f64>,

    /// Hard cap on recording length
    pub max_record_seconds: Option<f64>,

    /// Multiplier applied to the calibrated noise floor
    pub silence_threshold_multiplier: Option<f64>,

    /// BCM pin wired to the capacitive touch pad
    pub gpio_pin_touch: Option<u32>,

    /// Minimum time between two accepted touches
    pub touch_bounce_seconds: Option<f64>,

    pub led_count: Option<u32>,
    pub led_pin: Option<u32>,
    pub led_brightness: Option<f64>,
    pub led_dma: Option<u32>,
    pub led_freq_hz: Option<u32>,
    pub led_invert: Option<bool>,

    pub record_sample_rate: Option<u32>,
    pub record_channels: Option<u16>,
    pub record_blocksize: Option<usize>,

    /// Volume units moved per fade step
    pub ambient_fade_step: Option<i64>,

    /// Pause between fade steps, in seconds
    pub ambient_fade_interval: Option<f64>,

    /// System prompt sent with every chat request
    pub chat_system_prompt: Option<String>,

    /// Model identifiers for the three AI calls
    pub models: Option<ModelsFileConfig>,

    /// Asset and runtime file locations
    pub paths: Option<PathsFileConfig>,

    #[serde(default)]
    pub dry_run: DryRunFileConfig,

    #[serde(default)]
    pub wake_word: WakeWordFileConfig,

    #[serde(default)]
    pub conversation: ConversationFileConfig,

    #[serde(default)]
    pub web: WebFileConfig,

    #[serde(default)]
    pub playback: PlaybackFileConfig,
}

/// Model identifiers
#[derive(Debug, Default, Deserialize)]
pub struct ModelsFileConfig {
    /// Transcription model (e.g. "whisper-1")
    pub transcribe: Option<String>,

    /// Chat model (e.g. "gpt-4o-mini")
    pub chat: Option<String>,

    /// Speech model (e.g. "tts-1")
    pub tts: Option<String>,

    /// Speech voice (e.g. "alloy")
    pub tts_voice: Option<String>,
}

/// File locations
#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    pub ambient_loop: Option<PathBuf>,
    pub glass_chime: Option<PathBuf>,
    pub down_chime: Option<PathBuf>,
    pub tts_output: Option<PathBuf>,
    pub mpv_socket: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DryRunFileConfig {
    pub enabled: Option<bool>,
}

/// Wake word trigger configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeWordFileConfig {
    pub enabled: Option<bool>,

    /// Phrase that starts an interaction
    pub keyword: Option<String>,

    /// Detection engine ("keyboard" or "native")
    pub engine: Option<String>,

    /// Keep the touch pad active alongside the wake word
    pub allow_touch: Option<bool>,
}

/// Multi-turn conversation configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    pub enabled: Option<bool>,
    pub max_turns: Option<usize>,

    /// Idle time after which history is dropped; absent disables the reset
    pub reset_timeout_seconds: Option<f64>,

    /// Phrases that clear history instead of asking the assistant
    pub reset_phrases: Option<Vec<String>>,

    /// Record fallback replies as assistant turns
    pub persist_fallback_replies: Option<bool>,
}

/// Status API configuration
#[derive(Debug, Default, Deserialize)]
pub struct WebFileConfig {
    pub enabled: Option<bool>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Reply playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackFileConfig {
    /// "mpv" or "native"
    pub backend: Option<String>,
}

/// Read and parse a configuration file
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_config_file(path: &Path) -> Result<OrbConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let parsed = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(parsed)
}

/// Resolve the config path used when none is given on the command line
///
/// Prefers `./config.yaml`, then `~/.config/orb/config.yaml`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from("config.yaml");
    if local.exists() {
        return local;
    }
    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("orb").join("config.yaml"))
        .filter(|p| p.exists())
        .unwrap_or(local)
}
