use serde::{Deserialize, Serialize};

// ─── Message types ────────────────────────────────────────────────────────────

/// A single message in the conversation history.
///
/// `name` is only ever set on user messages whose speaker label differs from
/// the configured default user label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into(), name: None }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into(), name: None }
    }

    pub fn named_user(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into(), name: Some(name.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: text.into(), name: None }
    }

    /// Speaker used for token accounting: the display name, else the role.
    pub fn speaker(&self) -> &str {
        self.name.as_deref().unwrap_or(self.role.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Request / response ───────────────────────────────────────────────────────

/// Request sent to a model provider.
///
/// Sampling parameters are passed through unchanged; providers decide how to
/// map them onto their wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub stream: bool,
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            temperature: 0.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stream: true,
        }
    }
}

impl CompletionRequest {
    /// Build a streaming request carrying the sampling settings of `cfg`.
    pub fn from_config(cfg: &parley_config::ModelConfig, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            frequency_penalty: cfg.frequency_penalty,
            presence_penalty: cfg.presence_penalty,
            stream: true,
        }
    }
}

/// A single streamed event from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    /// The provider announced the start of the assistant turn
    AssistantStart,
    /// A text delta streamed from the model
    TextDelta(String),
    /// Final usage statistics
    Usage { input_tokens: u32, output_tokens: u32 },
    /// The stream finished normally
    Done,
    /// The provider reported an error inside an otherwise healthy stream
    Error(String),
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_prefers_name_over_role() {
        assert_eq!(ChatMessage::named_user("Martin", "hi").speaker(), "Martin");
        assert_eq!(ChatMessage::user("hi").speaker(), "user");
        assert_eq!(ChatMessage::system("x").speaker(), "system");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }

    #[test]
    fn name_is_serialized_only_when_present() {
        let json = serde_json::to_string(&ChatMessage::named_user("Me", "q")).unwrap();
        assert!(json.contains(r#""name":"Me""#));
    }

    #[test]
    fn request_copies_sampling_settings() {
        let cfg = parley_config::ModelConfig {
            temperature: 0.4,
            top_p: 0.9,
            ..Default::default()
        };
        let req = CompletionRequest::from_config(&cfg, vec![ChatMessage::user("x")]);
        assert_eq!(req.temperature, 0.4);
        assert_eq!(req.top_p, 0.9);
        assert!(req.stream);
        assert_eq!(req.messages.len(), 1);
    }
}
