// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! OpenAI-compatible chat completion client.
//!
//! Speaks the `/chat/completions` SSE streaming wire format used by OpenAI
//! and by local servers such as Ollama, vLLM or LM Studio.
//!
//! # Auth styles
//! - `Bearer`: `Authorization: Bearer <key>` (hosted APIs)
//! - `None`: no authentication header (local servers)

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{provider::ResponseStream, ChatMessage, CompletionRequest, ResponseEvent};

/// How to send the API key in HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No authentication header
    None,
}

/// OpenAI-compatible chat completion provider.
pub struct OpenAiProvider {
    /// Provider id returned by `ModelProvider::name()`.
    driver_name: &'static str,
    /// Model id forwarded to the API.
    model: String,
    /// API key (pre-resolved from config or env).
    api_key: Option<String>,
    /// Full chat completions URL, e.g. `https://api.openai.com/v1/chat/completions`.
    chat_url: String,
    client: reqwest::Client,
    auth_style: AuthStyle,
}

impl OpenAiProvider {
    /// Construct a provider from its API base and auth configuration.
    ///
    /// `base_url` ends **before** `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(
        driver_name: &'static str,
        model: String,
        api_key: Option<String>,
        base_url: &str,
        auth_style: AuthStyle,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            driver_name,
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            client: reqwest::Client::new(),
            auth_style,
        }
    }

    /// Request body for `req`, exposed for tests.
    fn request_body(&self, req: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "messages": build_openai_messages(&req.messages),
            "stream": req.stream,
            "temperature": req.temperature,
            "top_p": req.top_p,
            "frequency_penalty": req.frequency_penalty,
            "presence_penalty": req.presence_penalty,
        })
    }
}

#[async_trait]
impl crate::ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.driver_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let body = self.request_body(&req);

        debug!(
            driver = %self.driver_name,
            model = %self.model,
            message_count = req.messages.len(),
            "sending completion request"
        );
        tracing::trace!(request_body = ?body, "full completion request");

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        http_req = match self.auth_style {
            AuthStyle::Bearer => {
                let key = self.api_key.as_deref()
                    .context("API key not set; provide api_key or api_key_env in config")?;
                http_req.bearer_auth(key)
            }
            AuthStyle::None => http_req,
        };

        let resp = http_req.send().await
            .with_context(|| format!("{} request failed", self.driver_name))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("{} error {status}: {text}", self.driver_name);
        }

        // SSE events can be split across TCP packets.  Keep a line buffer
        // across chunks and only parse complete lines.
        let event_stream = resp
            .bytes_stream()
            .scan(String::new(), |buf, chunk| {
                let events: Vec<anyhow::Result<ResponseEvent>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(anyhow::anyhow!(e))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

/// Parse a single complete SSE `data:` line into zero or more events.
///
/// Empty lines, comments and unparseable payloads yield nothing.
fn parse_sse_data_line(line: &str) -> Vec<anyhow::Result<ResponseEvent>> {
    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return Vec::new();
    };
    if data.is_empty() {
        return Vec::new();
    }
    if data == "[DONE]" {
        return vec![Ok(ResponseEvent::Done)];
    }
    match serde_json::from_str::<Value>(data) {
        Ok(v) => parse_sse_chunk(&v).into_iter().map(Ok).collect(),
        Err(_) => Vec::new(),
    }
}

/// Drain all complete `\n`-terminated SSE lines from `buf`.
///
/// A trailing incomplete line stays in `buf` so the next chunk can extend it.
pub(crate) fn drain_complete_sse_lines(buf: &mut String) -> Vec<anyhow::Result<ResponseEvent>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        events.extend(parse_sse_data_line(&line));
    }
    events
}

/// Translate one decoded chunk into events.
///
/// The first chunk of a reply usually carries `delta.role = "assistant"`
/// with empty content; it becomes [`ResponseEvent::AssistantStart`].  A chunk
/// may carry both a role and content, in which case both events are emitted
/// in that order.
fn parse_sse_chunk(v: &Value) -> Vec<ResponseEvent> {
    let mut events = Vec::new();

    if let Some(err) = v.get("error").filter(|e| !e.is_null()) {
        let message = err["message"].as_str().unwrap_or("provider error").to_string();
        events.push(ResponseEvent::Error(message));
        return events;
    }

    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        events.push(ResponseEvent::Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        });
    }

    let delta = &v["choices"][0]["delta"];
    if delta["role"].as_str() == Some("assistant") {
        events.push(ResponseEvent::AssistantStart);
    }
    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            events.push(ResponseEvent::TextDelta(text.to_string()));
        }
    }
    events
}

/// Convert messages into the OpenAI wire-format JSON array.
///
/// Extracted as a free function so it can be unit-tested without HTTP.
pub(crate) fn build_openai_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut obj = json!({
                "role": m.role.as_str(),
                "content": m.content,
            });
            if let Some(name) = &m.name {
                obj["name"] = json!(sanitize_name(name));
            }
            obj
        })
        .collect()
}

/// The API restricts `name` to `^[a-zA-Z0-9_-]{1,64}$`.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() { "user".to_string() } else { cleaned }
}
