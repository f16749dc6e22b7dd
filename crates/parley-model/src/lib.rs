// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod types;
mod provider;
mod openai;
mod mock;
pub mod catalog;
pub mod transcribe;

pub use types::*;
pub use provider::{ModelProvider, ResponseStream};
pub use openai::{AuthStyle, OpenAiProvider};
pub use mock::{MockProvider, ScriptStep, ScriptedMockProvider};
pub use transcribe::{MockTranscriber, Transcriber, TranscriptionRequest, WhisperTranscriber};

use anyhow::bail;
use parley_config::ModelConfig;

/// Default API base for the hosted OpenAI service.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default API base of a local Ollama server.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Provider selection:
/// - `"openai"` → [`OpenAiProvider`] with bearer auth
/// - `"ollama"` → [`OpenAiProvider`] without auth against a local server
/// - `"mock"` → [`MockProvider`] (echo-back)
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(
            "openai",
            cfg.name.clone(),
            resolve_api_key(cfg),
            cfg.base_url.as_deref().unwrap_or(OPENAI_BASE_URL),
            AuthStyle::Bearer,
        ))),
        "ollama" => Ok(Box::new(OpenAiProvider::new(
            "ollama",
            cfg.name.clone(),
            None,
            cfg.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL),
            AuthStyle::None,
        ))),
        "mock" => Ok(Box::new(MockProvider)),
        other => bail!("unknown model provider: {other}"),
    }
}

fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Some(env) = &cfg.api_key_env {
        return std::env::var(env).ok();
    }
    None
}
