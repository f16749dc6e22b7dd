// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::{provider::ResponseStream, CompletionRequest, ResponseEvent, Role};

/// Deterministic mock provider for tests.  Echoes the last user message
/// back as the assistant response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl crate::ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("[no input]")
            .to_string();

        let events: Vec<anyhow::Result<ResponseEvent>> = vec![
            Ok(ResponseEvent::AssistantStart),
            Ok(ResponseEvent::TextDelta(format!("MOCK: {reply}"))),
            Ok(ResponseEvent::Usage { input_tokens: 10, output_tokens: 10 }),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// One step of a scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Event(ResponseEvent),
    /// The stream breaks with a transport error carrying this message
    Fail(String),
}

/// How a scripted call behaves.
#[derive(Debug, Clone)]
enum Script {
    Stream(Vec<ScriptStep>),
    /// `complete()` itself fails before any stream exists
    Refuse(String),
}

/// A pre-scripted mock provider.  Each call to `complete` pops the next
/// script from the front of the queue, so tests can specify exact event
/// sequences (including mid-stream failures) without network access.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<Script>>>,
    model: String,
    /// The last `CompletionRequest` seen by this provider.
    /// Written on each `complete()` call so tests can inspect what was sent.
    pub last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    /// Build a provider from a list of event scripts, one per call.
    pub fn new(scripts: Vec<Vec<ResponseEvent>>) -> Self {
        let scripts = scripts
            .into_iter()
            .map(|events| Script::Stream(events.into_iter().map(ScriptStep::Event).collect()))
            .collect();
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            model: "scripted-mock-model".into(),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Report a different model name (drives catalog lookups).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Convenience: provider that streams `reply` in the given pieces.
    pub fn streaming(pieces: &[&str]) -> Self {
        let mut events = vec![ResponseEvent::AssistantStart];
        events.extend(pieces.iter().map(|p| ResponseEvent::TextDelta(p.to_string())));
        events.push(ResponseEvent::Done);
        Self::new(vec![events])
    }

    /// Convenience: provider that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![vec![
            ResponseEvent::AssistantStart,
            ResponseEvent::TextDelta(reply.into()),
            ResponseEvent::Usage { input_tokens: 5, output_tokens: 5 },
            ResponseEvent::Done,
        ]])
    }

    /// Convenience: stream `pieces`, then break with a transport error.
    pub fn failing_after(pieces: &[&str], message: impl Into<String>) -> Self {
        let mut steps = vec![ScriptStep::Event(ResponseEvent::AssistantStart)];
        steps.extend(pieces.iter().map(|p| ScriptStep::Event(ResponseEvent::TextDelta(p.to_string()))));
        steps.push(ScriptStep::Fail(message.into()));
        Self::from_steps(vec![steps])
    }

    /// Convenience: `complete()` fails before streaming anything.
    pub fn refusing(message: impl Into<String>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(vec![Script::Refuse(message.into())])),
            model: "scripted-mock-model".into(),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_steps(scripts: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into_iter().map(Script::Stream).collect())),
            model: "scripted-mock-model".into(),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Messages of the most recent request, if any.
    pub fn last_messages(&self) -> Option<Vec<crate::ChatMessage>> {
        self.last_request
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|r| r.messages.clone()))
    }
}

#[async_trait]
impl crate::ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(req);
        }
        let script = {
            let mut scripts = self
                .scripts
                .lock()
                .map_err(|_| anyhow::anyhow!("mock script queue poisoned"))?;
            if scripts.is_empty() {
                // Default fallback when all scripts are consumed
                Script::Stream(vec![
                    ScriptStep::Event(ResponseEvent::TextDelta("[no more scripts]".into())),
                    ScriptStep::Event(ResponseEvent::Done),
                ])
            } else {
                scripts.remove(0)
            }
        };
        match script {
            Script::Refuse(message) => Err(anyhow::anyhow!(message)),
            Script::Stream(steps) => {
                let wrapped: Vec<anyhow::Result<ResponseEvent>> = steps
                    .into_iter()
                    .map(|s| match s {
                        ScriptStep::Event(ev) => Ok(ev),
                        ScriptStep::Fail(message) => Err(anyhow::anyhow!(message)),
                    })
                    .collect();
                Ok(Box::pin(stream::iter(wrapped)))
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::{ChatMessage, CompletionRequest, ModelProvider, ResponseEvent};

    fn req() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            ..Default::default()
        }
    }

    async fn collect(p: &dyn ModelProvider) -> Vec<anyhow::Result<ResponseEvent>> {
        let mut stream = p.complete(req()).await.unwrap();
        let mut events = Vec::new();
        while let Some(ev) = stream.next().await {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn mock_echoes_last_user_message() {
        let events = collect(&MockProvider).await;
        assert!(events.iter().any(|e| matches!(e, Ok(ResponseEvent::TextDelta(t)) if t == "MOCK: hi")));
        assert!(matches!(events.last(), Some(Ok(ResponseEvent::Done))));
    }

    #[tokio::test]
    async fn scripted_streaming_emits_pieces_in_order() {
        let p = ScriptedMockProvider::streaming(&["a", "b"]);
        let texts: Vec<String> = collect(&p)
            .await
            .into_iter()
            .filter_map(|e| match e {
                Ok(ResponseEvent::TextDelta(t)) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn scripted_failure_arrives_after_partial_output() {
        let p = ScriptedMockProvider::failing_after(&["partial"], "connection reset");
        let events = collect(&p).await;
        assert!(matches!(&events[1], Ok(ResponseEvent::TextDelta(t)) if t == "partial"));
        let err = events.last().unwrap().as_ref().unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }

    #[tokio::test]
    async fn refusing_provider_fails_before_stream() {
        let p = ScriptedMockProvider::refusing("401 unauthorized");
        assert!(p.complete(req()).await.is_err());
    }

    #[tokio::test]
    async fn last_request_is_recorded() {
        let p = ScriptedMockProvider::always_text("ok");
        let _ = p.complete(req()).await.unwrap();
        let msgs = p.last_messages().unwrap();
        assert_eq!(msgs, vec![ChatMessage::user("hi")]);
    }

    #[tokio::test]
    async fn scripted_fallback_when_scripts_exhausted() {
        let p = ScriptedMockProvider::new(vec![]);
        let events = collect(&p).await;
        assert!(matches!(&events[0], Ok(ResponseEvent::TextDelta(t)) if t.contains("no more scripts")));
    }
}
