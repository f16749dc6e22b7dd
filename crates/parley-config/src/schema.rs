// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Serde default helper returning `true`.
///
/// `#[serde(default)]` on a `bool` falls back to `false`, so fields that
/// should be enabled unless switched off need a named function.
fn default_true() -> bool {
    true
}

/// Built-in core prompt, sent as the first system message of every chat.
pub const DEFAULT_CORE_PROMPT: &str = "**Heuristics**\n\
Your 3 key Heuristic Imperatives are to:\n  \
- reduce suffering in the universe.\n  \
- increase prosperity in the universe.\n  \
- increase understanding in the universe.";

/// Prefix of the system message that carries document metadata as JSON.
pub const DEFAULT_META_PROMPT: &str = "**Metadata** (as JSON):";

/// Fully resolved configuration.
///
/// Built once per invocation from the layers described in [`crate::ConfigLayer`];
/// every stage of the pipeline reads from this value and never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub whisper: WhisperConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier: "openai" | "ollama" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Speaker label used for assistant turns in the document (`__Label:__`)
    pub label: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files
    pub api_key: Option<String>,
    /// Base URL override, e.g. a local proxy or an Ollama server
    pub base_url: Option<String>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: f32,
    /// Nucleus sampling mass (0.0–1.0)
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Context window override.  When unset the bundled catalog decides.
    pub context_window: Option<u32>,
    /// Name of a preset config document under `{data}/configs/`, without
    /// the `.md` extension.
    pub config: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-3.5-turbo".into(),
            label: "Parley".into(),
            api_key_env: Some("OPENAI_API_KEY".into()),
            api_key: None,
            base_url: None,
            temperature: 0.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            context_window: None,
            config: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Transcription model, e.g. "whisper-1"
    pub model: String,
    /// Base URL of the OpenAI-compatible audio API
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    /// Prompt text that primes the transcription (names, jargon, style)
    pub input: Option<String>,
    /// ISO-639-1 language.  When unset audio is translated to English.
    pub language: Option<String>,
    pub temperature: f32,
    /// Suffix for transcripts produced during this run
    pub live_suffix: String,
    /// Suffix for transcripts recovered from an earlier run's callout
    pub read_suffix: String,
    /// Echo each transcript into the document as a `[!QUOTE]` callout
    #[serde(default = "default_true")]
    pub echo_output: bool,
    /// Delete the audio file once its transcript is committed
    pub delete_file: bool,
    /// Name of a config document whose body becomes `input`
    pub config: Option<String>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model: "whisper-1".into(),
            base_url: None,
            api_key_env: Some("OPENAI_API_KEY".into()),
            api_key: None,
            input: None,
            language: None,
            temperature: 0.0,
            live_suffix: "dictated, but not read".into(),
            read_suffix: "transcribed and read".into(),
            echo_output: true,
            delete_file: false,
            config: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Label given to unlabeled turns.  User turns carrying exactly this
    /// label are sent without a `name`.
    pub label: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self { label: "User".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Line literal that ends a turn
    pub separator: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self { separator: "---".into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root for config documents and logs.  `~` is expanded.
    pub data_dir: Option<PathBuf>,
    /// Extra directory searched when resolving embedded file links
    pub vault_dir: Option<PathBuf>,
}

impl PathsConfig {
    /// Resolved data directory: the configured path, otherwise
    /// `$XDG_DATA_HOME/parley`, otherwise `.parley` in the working directory.
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(p) => expand_tilde(p),
            None => dirs::data_dir()
                .map(|d| d.join("parley"))
                .unwrap_or_else(|| PathBuf::from(".parley")),
        }
    }

    pub fn vault_dir(&self) -> Option<PathBuf> {
        self.vault_dir.as_deref().map(expand_tilde)
    }

    /// Directory holding preset config documents.
    pub fn configs_dir(&self) -> PathBuf {
        self.data_dir().join("configs")
    }
}

fn expand_tilde(p: &std::path::Path) -> PathBuf {
    let raw = p.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub core: String,
    pub meta: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            core: DEFAULT_CORE_PROMPT.into(),
            meta: DEFAULT_META_PROMPT.into(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
