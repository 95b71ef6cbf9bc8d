//! AI service boundary: transcription, chat and speech synthesis

mod openai;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiProvider;

use crate::Result;

/// Reply spoken when the chat service returns no usable text
pub const FALLBACK_REPLY: &str = "Sorry, I didn't catch that. Please try asking again.";

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Outcome of a chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// Trimmed assistant text
    Text(String),
    /// The service answered without usable content
    Fallback,
}

impl ChatReply {
    /// Build from raw message content, falling back on empty or missing text
    #[must_use]
    pub fn from_content(content: Option<&str>) -> Self {
        match content.map(str::trim) {
            Some(text) if !text.is_empty() => Self::Text(text.to_string()),
            _ => Self::Fallback,
        }
    }

    /// Text to speak
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Fallback => FALLBACK_REPLY,
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }
}

/// The three AI calls an interaction needs
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Transcribe a recording; the result is trimmed
    ///
    /// # Errors
    ///
    /// Returns `Error::Provider` if the service call fails
    async fn transcribe(&self, audio_path: &Path, model: &str) -> Result<String>;

    /// Ask the chat model for a reply
    ///
    /// # Errors
    ///
    /// Returns `Error::Provider` if the service call fails
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<ChatReply>;

    /// Synthesize `text` to an audio file at `output_path`
    ///
    /// # Errors
    ///
    /// Returns `Error::Provider` if the service call fails
    async fn synthesize(&self, text: &str, model: &str, output_path: &Path) -> Result<PathBuf>;
}
