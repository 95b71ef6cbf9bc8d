//! OpenAI provider tests against a local mock server

use std::sync::{Arc, Mutex};

use ambient_orb::Error;
use ambient_orb::provider::{
    AiProvider, ChatMessage, ChatReply, FALLBACK_REPLY, OpenAiProvider, Role,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Default)]
struct Mock {
    /// Raw `choices` returned by chat completions
    choices: Option<Value>,
    fail: bool,
    authorization: Vec<String>,
    chat_requests: Vec<Value>,
    speech_requests: Vec<Value>,
    transcription_bodies: Vec<Vec<u8>>,
}

type Shared = Arc<Mutex<Mock>>;

fn record_auth(mock: &Shared, headers: &HeaderMap) {
    if let Some(value) = headers.get("authorization") {
        mock.lock()
            .unwrap()
            .authorization
            .push(value.to_str().unwrap().to_string());
    }
}

async fn transcriptions(
    State(mock): State<Shared>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    record_auth(&mock, &headers);
    let mut m = mock.lock().unwrap();
    m.transcription_bodies.push(body.to_vec());
    if m.fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})));
    }
    (StatusCode::OK, Json(json!({"text": "  what time is it \n"})))
}

async fn chat(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> impl IntoResponse {
    record_auth(&mock, &headers);
    let mut m = mock.lock().unwrap();
    m.chat_requests.push(request);
    if m.fail {
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "slow down"})));
    }
    let choices = m.choices.clone().unwrap_or_else(
        || json!([{"message": {"role": "assistant", "content": "  It is noon.  "}}]),
    );
    (StatusCode::OK, Json(json!({ "choices": choices })))
}

async fn speech(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> impl IntoResponse {
    record_auth(&mock, &headers);
    let mut m = mock.lock().unwrap();
    m.speech_requests.push(request);
    if m.fail {
        return (StatusCode::BAD_GATEWAY, Vec::new());
    }
    (StatusCode::OK, b"ID3-not-really-mp3".to_vec())
}

/// Start the mock and return a provider pointed at it
async fn start_mock(mock: Shared) -> OpenAiProvider {
    let app = Router::new()
        .route("/v1/audio/transcriptions", post(transcriptions))
        .route("/v1/chat/completions", post(chat))
        .route("/v1/audio/speech", post(speech))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    OpenAiProvider::new(
        SecretString::from("sk-test"),
        format!("http://{addr}/v1/"),
        "nova",
    )
}

fn messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::new(Role::System, "You are a calm orb."),
        ChatMessage::new(Role::User, "what time is it"),
    ]
}

#[tokio::test]
async fn test_transcribe_trims_text() {
    let mock = Shared::default();
    let provider = start_mock(Arc::clone(&mock)).await;
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("utterance.wav");
    std::fs::write(&audio, b"RIFF....WAVE").unwrap();

    let text = provider.transcribe(&audio, "whisper-1").await.unwrap();

    assert_eq!(text, "what time is it");
    let m = mock.lock().unwrap();
    assert_eq!(m.authorization, vec!["Bearer sk-test".to_string()]);
    let body = String::from_utf8_lossy(&m.transcription_bodies[0]);
    assert!(body.contains("whisper-1"));
    assert!(body.contains("utterance.wav"));
}

#[tokio::test]
async fn test_chat_sends_history_and_limits() {
    let mock = Shared::default();
    let provider = start_mock(Arc::clone(&mock)).await;

    let reply = provider.chat(&messages(), "gpt-4o-mini").await.unwrap();

    assert_eq!(reply, ChatReply::Text("It is noon.".to_string()));
    let m = mock.lock().unwrap();
    let request = &m.chat_requests[0];
    assert_eq!(request["model"], "gpt-4o-mini");
    assert_eq!(request["max_tokens"], 140);
    assert_eq!(request["temperature"], 0.5);
    assert_eq!(request["messages"][0]["role"], "system");
    assert_eq!(request["messages"][1]["content"], "what time is it");
}

#[tokio::test]
async fn test_chat_without_content_falls_back() {
    let mock = Shared::default();
    mock.lock().unwrap().choices = Some(json!([{"message": {"role": "assistant", "content": null}}]));
    let provider = start_mock(Arc::clone(&mock)).await;

    let reply = provider.chat(&messages(), "gpt-4o-mini").await.unwrap();

    assert!(reply.is_fallback());
    assert_eq!(reply.text(), FALLBACK_REPLY);
}

#[tokio::test]
async fn test_chat_choice_without_message_falls_back() {
    let mock = Shared::default();
    mock.lock().unwrap().choices = Some(json!([{"finish_reason": "stop"}]));
    let provider = start_mock(Arc::clone(&mock)).await;

    let reply = provider.chat(&messages(), "gpt-4o-mini").await.unwrap();

    assert!(reply.is_fallback());
    assert_eq!(reply.text(), FALLBACK_REPLY);
}

#[tokio::test]
async fn test_chat_non_string_content_falls_back() {
    let mock = Shared::default();
    mock.lock().unwrap().choices = Some(json!([{
        "message": {"role": "assistant", "content": [{"type": "text", "text": "hi"}]}
    }]));
    let provider = start_mock(Arc::clone(&mock)).await;

    let reply = provider.chat(&messages(), "gpt-4o-mini").await.unwrap();

    assert!(reply.is_fallback());
}

#[tokio::test]
async fn test_chat_with_no_choices_falls_back() {
    let mock = Shared::default();
    mock.lock().unwrap().choices = Some(json!([]));
    let provider = start_mock(Arc::clone(&mock)).await;

    let reply = provider.chat(&messages(), "gpt-4o-mini").await.unwrap();

    assert!(reply.is_fallback());
}

#[tokio::test]
async fn test_chat_http_error_is_provider_error() {
    let mock = Shared::default();
    mock.lock().unwrap().fail = true;
    let provider = start_mock(Arc::clone(&mock)).await;

    let err = provider.chat(&messages(), "gpt-4o-mini").await.unwrap_err();

    assert!(matches!(err, Error::Provider(ref msg) if msg.contains("429")));
}

#[tokio::test]
async fn test_synthesize_writes_file_and_creates_dirs() {
    let mock = Shared::default();
    let provider = start_mock(Arc::clone(&mock)).await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested").join("reply.mp3");

    let path = provider
        .synthesize("It is noon.", "tts-1", &output)
        .await
        .unwrap();

    assert_eq!(path, output);
    assert_eq!(std::fs::read(&output).unwrap(), b"ID3-not-really-mp3");
    let m = mock.lock().unwrap();
    let request = &m.speech_requests[0];
    assert_eq!(request["voice"], "nova");
    assert_eq!(request["input"], "It is noon.");
    assert_eq!(request["response_format"], "mp3");
}

#[tokio::test]
async fn test_transcribe_failure_is_provider_error() {
    let mock = Shared::default();
    mock.lock().unwrap().fail = true;
    let provider = start_mock(Arc::clone(&mock)).await;
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("utterance.wav");
    std::fs::write(&audio, b"RIFF").unwrap();

    let err = provider.transcribe(&audio, "whisper-1").await.unwrap_err();

    assert!(matches!(err, Error::Provider(_)));
}
