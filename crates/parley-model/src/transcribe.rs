//! Audio transcription through the OpenAI-compatible `/audio/*` endpoints.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// One audio file to transcribe.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRequest {
    pub audio: Vec<u8>,
    /// File name sent with the upload; the server infers the format from it
    pub file_name: String,
    /// Priming prompt (names, vocabulary, style)
    pub prompt: Option<String>,
    /// ISO-639-1 language of the audio.  `None` asks for an English translation.
    pub language: Option<String>,
    pub temperature: f32,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, req: TranscriptionRequest) -> anyhow::Result<String>;
}

/// Whisper over HTTP.
pub struct WhisperTranscriber {
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(model: String, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(cfg: &parley_config::WhisperConfig) -> Self {
        let key = cfg
            .api_key
            .clone()
            .or_else(|| cfg.api_key_env.as_ref().and_then(|env| std::env::var(env).ok()));
        let base = cfg.base_url.as_deref().unwrap_or(crate::OPENAI_BASE_URL);
        Self::new(cfg.model.clone(), base, key)
    }

    /// Endpoint for `req`: transcription when the language is known,
    /// translation otherwise.
    fn endpoint(&self, req: &TranscriptionRequest) -> String {
        match req.language {
            Some(_) => format!("{}/audio/transcriptions", self.base_url),
            None => format!("{}/audio/translations", self.base_url),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, req: TranscriptionRequest) -> anyhow::Result<String> {
        let url = self.endpoint(&req);
        debug!(url = %url, file = %req.file_name, bytes = req.audio.len(), "uploading audio");

        let part = reqwest::multipart::Part::bytes(req.audio)
            .file_name(req.file_name.clone());
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("temperature", req.temperature.to_string());
        if let Some(prompt) = req.prompt {
            form = form.text("prompt", prompt);
        }
        if let Some(lang) = req.language {
            form = form.text("language", lang);
        }

        let mut http_req = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(std::time::Duration::from_secs(300));
        if let Some(key) = &self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let resp = http_req.send().await.context("whisper request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("whisper error {status}: {body}");
        }
        let body: WhisperResponse = resp.json().await.context("parsing whisper response")?;
        Ok(body.text)
    }
}

/// Test transcriber returning canned text and recording every request.
#[derive(Default)]
pub struct MockTranscriber {
    reply: Option<String>,
    failure: Option<String>,
    pub requests: Arc<Mutex<Vec<TranscriptionRequest>>>,
}

impl MockTranscriber {
    pub fn replying(text: impl Into<String>) -> Self {
        Self { reply: Some(text.into()), ..Default::default() }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { failure: Some(message.into()), ..Default::default() }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, req: TranscriptionRequest) -> anyhow::Result<String> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(req);
        }
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        Ok(self.reply.clone().unwrap_or_default())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
