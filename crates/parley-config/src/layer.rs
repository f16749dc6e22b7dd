// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Typed override layers.
//!
//! A [`ConfigLayer`] mirrors [`Config`] with every field optional.  Layers are
//! applied on top of each other in a fixed order, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. TOML settings files (see [`crate::load`])
//! 3. `PARLEY_*` environment variables
//! 4. front-matter of the referenced config document
//! 5. front-matter of the document itself
//! 6. command-line overrides

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Config;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub model: ModelLayer,
    pub whisper: WhisperLayer,
    pub user: UserLayer,
    pub document: DocumentLayer,
    pub paths: PathsLayer,
    pub prompts: PromptsLayer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelLayer {
    pub provider: Option<String>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub context_window: Option<u32>,
    pub config: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperLayer {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    pub input: Option<String>,
    pub language: Option<String>,
    pub temperature: Option<f32>,
    pub live_suffix: Option<String>,
    pub read_suffix: Option<String>,
    pub echo_output: Option<bool>,
    pub delete_file: Option<bool>,
    pub config: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserLayer {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentLayer {
    pub separator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsLayer {
    pub data_dir: Option<PathBuf>,
    pub vault_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsLayer {
    pub core: Option<String>,
    pub meta: Option<String>,
}

fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
    if let Some(v) = src {
        *dst = v.clone();
    }
}

fn set_opt<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(v) = src {
        *dst = Some(v.clone());
    }
}

impl Config {
    /// Overlay `layer` onto this config; every `Some` in the layer wins.
    pub fn apply(&mut self, layer: &ConfigLayer) {
        let m = &layer.model;
        set(&mut self.model.provider, &m.provider);
        set(&mut self.model.name, &m.name);
        set(&mut self.model.label, &m.label);
        set_opt(&mut self.model.api_key_env, &m.api_key_env);
        set_opt(&mut self.model.api_key, &m.api_key);
        set_opt(&mut self.model.base_url, &m.base_url);
        set(&mut self.model.temperature, &m.temperature);
        set(&mut self.model.top_p, &m.top_p);
        set(&mut self.model.frequency_penalty, &m.frequency_penalty);
        set(&mut self.model.presence_penalty, &m.presence_penalty);
        set_opt(&mut self.model.context_window, &m.context_window);
        set_opt(&mut self.model.config, &m.config);

        let w = &layer.whisper;
        set(&mut self.whisper.model, &w.model);
        set_opt(&mut self.whisper.base_url, &w.base_url);
        set_opt(&mut self.whisper.api_key_env, &w.api_key_env);
        set_opt(&mut self.whisper.api_key, &w.api_key);
        set_opt(&mut self.whisper.input, &w.input);
        set_opt(&mut self.whisper.language, &w.language);
        set(&mut self.whisper.temperature, &w.temperature);
        set(&mut self.whisper.live_suffix, &w.live_suffix);
        set(&mut self.whisper.read_suffix, &w.read_suffix);
        set(&mut self.whisper.echo_output, &w.echo_output);
        set(&mut self.whisper.delete_file, &w.delete_file);
        set_opt(&mut self.whisper.config, &w.config);

        set(&mut self.user.label, &layer.user.label);
        set(&mut self.document.separator, &layer.document.separator);
        set_opt(&mut self.paths.data_dir, &layer.paths.data_dir);
        set_opt(&mut self.paths.vault_dir, &layer.paths.vault_dir);
        set(&mut self.prompts.core, &layer.prompts.core);
        set(&mut self.prompts.meta, &layer.prompts.meta);
    }

    /// Apply a sequence of layers in order and return the result.
    pub fn layered<'a>(mut self, layers: impl IntoIterator<Item = &'a ConfigLayer>) -> Self {
        for layer in layers {
            self.apply(layer);
        }
        self
    }
}

impl ConfigLayer {
    /// Parse a layer from a YAML mapping (front-matter).  Unknown keys are
    /// ignored so documents can carry arbitrary metadata next to overrides.
    pub fn from_yaml_value(value: serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(value)
    }

    pub fn is_empty(&self) -> bool {
        self == &ConfigLayer::default()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
