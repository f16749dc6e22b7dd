// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Call and chat logs under `{data}/history`.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use parley_config::Config;
use parley_input::{render_message, serialize_history, ParseOptions};
use parley_model::ChatMessage;
use serde::Serialize;
use tracing::debug;

use crate::disk::Disk;

/// Settings recorded with each call.  API keys are never part of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedSettings {
    pub model: LoggedModel,
    pub whisper: LoggedWhisper,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedModel {
    pub provider: String,
    pub name: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedWhisper {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub temperature: f32,
    pub echo_output: bool,
    pub delete_file: bool,
}

impl From<&Config> for LoggedSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            model: LoggedModel {
                provider: cfg.model.provider.clone(),
                name: cfg.model.name.clone(),
                label: cfg.model.label.clone(),
                base_url: cfg.model.base_url.clone(),
                temperature: cfg.model.temperature,
                top_p: cfg.model.top_p,
                frequency_penalty: cfg.model.frequency_penalty,
                presence_penalty: cfg.model.presence_penalty,
            },
            whisper: LoggedWhisper {
                model: cfg.whisper.model.clone(),
                language: cfg.whisper.language.clone(),
                temperature: cfg.whisper.temperature,
                echo_output: cfg.whisper.echo_output,
                delete_file: cfg.whisper.delete_file,
            },
        }
    }
}

fn dated_dir(cfg: &Config, kind: &str, at: DateTime<Utc>) -> PathBuf {
    cfg.paths.data_dir().join("history").join(kind).join(at.format("%Y/%m/%d").to_string())
}

/// Write the settings and full message list of one call to
/// `history/calls/YYYY/MM/DD/{epoch_ms}.md`.
pub async fn write_call_log(
    disk: &dyn Disk,
    cfg: &Config,
    opts: &ParseOptions,
    messages: &[ChatMessage],
    at: DateTime<Utc>,
) -> anyhow::Result<PathBuf> {
    let dir = dated_dir(cfg, "calls", at);
    disk.path_ensure(&dir).await?;
    let path = dir.join(format!("{}.md", at.timestamp_millis()));

    let settings = serde_yaml::to_string(&LoggedSettings::from(cfg)).context("serializing settings")?;
    let text = format!("---\n{settings}---\n\n{}", serialize_history(messages, opts));
    disk.append_file(&path, &text).await?;
    debug!(path = %path.display(), "wrote call log");
    Ok(path)
}

/// Append the prompt and reply of a run to
/// `history/chats/YYYY/MM/DD/{stem}.md`, stamped with the start and finish
/// times.
pub async fn write_chat_log(
    disk: &dyn Disk,
    cfg: &Config,
    opts: &ParseOptions,
    stem: &str,
    messages: &[ChatMessage],
    started: DateTime<Utc>,
    finished: DateTime<Utc>,
) -> anyhow::Result<PathBuf> {
    let dir = dated_dir(cfg, "chats", finished);
    disk.path_ensure(&dir).await?;
    let path = dir.join(format!("{stem}.md"));

    let tail = &messages[messages.len().saturating_sub(2)..];
    let stamps = [started, finished];
    let offset = stamps.len() - tail.len();
    let rendered: Vec<String> = tail
        .iter()
        .zip(&stamps[offset..])
        .map(|(m, at)| format!("[{}] {}", at.format("%H:%M:%S%.3fZ"), render_message(m, opts)))
        .collect();
    let text = format!("\n{}\n", rendered.join(&format!("\n\n{}\n\n", opts.separator)));
    disk.append_file(&path, &text).await?;
    debug!(path = %path.display(), "wrote chat log");
    Ok(path)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
