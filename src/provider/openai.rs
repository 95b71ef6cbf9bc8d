//! OpenAI-compatible HTTP provider

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::{AiProvider, ChatMessage, ChatReply};
use crate::{Error, Result};

const CHAT_TEMPERATURE: f32 = 0.5;
const CHAT_MAX_TOKENS: u32 = 140;

/// Talks to `/audio/transcriptions`, `/chat/completions` and `/audio/speech`
pub struct OpenAiProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
    voice: String,
}

impl OpenAiProvider {
    /// Create a provider for `base_url` (e.g. `https://api.openai.com/v1`)
    #[must_use]
    pub fn new(api_key: SecretString, base_url: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            voice: voice.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    /// Anything but a string counts as missing
    #[serde(default)]
    content: Option<serde_json::Value>,
}

impl ChatCompletionResponse {
    fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_ref())
            .and_then(serde_json::Value::as_str)
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Turn a non-success response into a provider error
async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Provider(format!("{what} error {status}: {body}")))
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn transcribe(&self, audio_path: &Path, model: &str) -> Result<String> {
        let audio = tokio::fs::read(audio_path).await?;
        tracing::debug!(audio_bytes = audio.len(), model, "starting transcription");

        let file_name = audio_path
            .file_name()
            .map_or_else(|| "audio.wav".to_string(), |n| n.to_string_lossy().into_owned());
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name(file_name)
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Provider(e.to_string()))?,
            )
            .text("model", model.to_string());

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("transcription request failed: {e}")))?;

        let result: TranscriptionResponse = check_status(response, "transcription")
            .await?
            .json()
            .await
            .map_err(|e| Error::Provider(format!("failed to parse transcription: {e}")))?;

        Ok(result.text.trim().to_string())
    }

    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<ChatReply> {
        let request = ChatCompletionRequest {
            model,
            messages,
            temperature: CHAT_TEMPERATURE,
            max_tokens: CHAT_MAX_TOKENS,
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .header("Authorization", self.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("chat request failed: {e}")))?;

        let body = check_status(response, "chat")
            .await?
            .bytes()
            .await
            .map_err(|e| Error::Provider(format!("failed to read chat response: {e}")))?;

        let parsed = serde_json::from_slice::<ChatCompletionResponse>(&body);
        if let Err(e) = &parsed {
            tracing::warn!(error = %e, "malformed chat response");
        }
        let content = parsed.as_ref().ok().and_then(ChatCompletionResponse::first_content);
        let reply = ChatReply::from_content(content);
        if reply.is_fallback() {
            tracing::warn!(model, "chat returned no content, using fallback reply");
        }
        Ok(reply)
    }

    async fn synthesize(&self, text: &str, model: &str, output_path: &Path) -> Result<PathBuf> {
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let request = SpeechRequest {
            model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(self.url("audio/speech"))
            .header("Authorization", self.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("speech request failed: {e}")))?;
        let mut response = check_status(response, "speech").await?;

        let mut file = tokio::fs::File::create(output_path).await?;
        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Provider(format!("speech download failed: {e}")))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        tracing::debug!(path = %output_path.display(), bytes = written, "speech saved");
        Ok(output_path.to_path_buf())
    }
}
