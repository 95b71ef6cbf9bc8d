//! Error types for the orb controller

use thiserror::Error;

/// Result type alias for orb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the orb controller
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing key, out-of-range value)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio input device or capture stream error
    #[error("capture error: {0}")]
    Capture(String),

    /// Transcription, chat or speech synthesis failure
    #[error("provider error: {0}")]
    Provider(String),

    /// Ambient player control channel failure
    #[error("channel error: {0}")]
    Channel(String),

    /// Ambient player did not expose its control channel in time
    #[error("startup timeout: {0}")]
    StartupTimeout(String),

    /// Audio decoding or output error
    #[error("playback error: {0}")]
    Playback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => Self::Io(io),
            other => Self::Playback(other.to_string()),
        }
    }
}
