// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Commands run against a document: chat, process, prompt and tokens.
//!
//! The pipeline is the only writer of the document.  Everything it adds
//! (callouts, the streamed reply, the token report, the next speaker label)
//! is appended; existing text is never rewritten.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::anyhow;
use chrono::Utc;
use futures::{future::join_all, StreamExt};
use parley_config::{Config, ConfigLayer};
use parley_input::{load_content, message_for};
use parley_model::{
    ChatMessage, CompletionRequest, ModelProvider, ResponseEvent, Transcriber, WhisperTranscriber,
};
use tracing::{debug, info, warn};

use crate::{
    callouts,
    context::{Context, Services},
    enrich::Stage,
    logs,
    tokens::{context_limit, TiktokenTokenizer, TokenReport, Tokenizer, WordTokenizer},
};

/// Result of a `chat` run.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Streamed reply text, possibly partial
    pub reply: String,
    pub report: TokenReport,
    pub call_log: Option<PathBuf>,
    pub chat_log: Option<PathBuf>,
}

pub struct Pipeline {
    services: Services,
    base: Config,
    overrides: ConfigLayer,
}

impl Pipeline {
    /// `base` holds defaults, settings files and the environment;
    /// `overrides` comes from the command line and wins over front-matter.
    pub fn new(services: Services, base: Config, overrides: ConfigLayer) -> Self {
        Self { services, base, overrides }
    }

    async fn load(&self, path: &Path) -> anyhow::Result<Context> {
        Context::load(self.services.disk.as_ref(), path, &self.base, &self.overrides).await
    }

    async fn append(&self, path: &Path, text: &str) -> anyhow::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.services.disk.append_file(path, text).await
    }

    async fn append_all(&self, path: &Path, callouts: &[String]) -> anyhow::Result<()> {
        self.append(path, &callouts.concat()).await
    }

    fn transcriber(&self, cfg: &Config) -> Arc<dyn Transcriber> {
        match &self.services.transcriber {
            Some(t) => t.clone(),
            None => Arc::new(WhisperTranscriber::from_config(&cfg.whisper)),
        }
    }

    fn provider(&self, cfg: &Config) -> anyhow::Result<Arc<dyn ModelProvider>> {
        match &self.services.provider {
            Some(p) => Ok(p.clone()),
            None => Ok(Arc::from(parley_model::from_config(&cfg.model)?)),
        }
    }

    fn tokenizer(&self, cfg: &Config) -> Arc<dyn Tokenizer> {
        if let Some(t) = &self.services.tokenizer {
            return t.clone();
        }
        match TiktokenTokenizer::for_model(&cfg.model.name) {
            Ok(t) => Arc::new(t),
            Err(e) => {
                warn!("no BPE table available, counting words: {e:#}");
                Arc::new(WordTokenizer)
            }
        }
    }

    fn report(&self, cfg: &Config, messages: &[ChatMessage]) -> TokenReport {
        let tokenizer = self.tokenizer(cfg);
        TokenReport::measure(messages, tokenizer.as_ref(), context_limit(&cfg.model))
    }

    fn stage<'a>(&'a self, ctx: &'a Context, transcriber: &'a dyn Transcriber) -> anyhow::Result<Stage<'a>> {
        Stage::new(
            self.services.disk.as_ref(),
            &ctx.config,
            &ctx.doc_dir,
            transcriber,
            self.services.fetcher.as_ref(),
            self.services.pdf.as_deref(),
        )
    }

    /// Core prompt and the metadata message.
    fn system_prelude(ctx: &Context) -> anyhow::Result<Vec<ChatMessage>> {
        let mut messages = vec![ChatMessage::system(ctx.config.prompts.core.clone())];
        messages.extend(ctx.meta_message()?);
        Ok(messages)
    }

    // ── chat ──────────────────────────────────────────────────────────────────

    /// Send the document to the model and append the streamed reply.
    pub async fn chat(&self, path: &Path) -> anyhow::Result<ChatOutcome> {
        let started = Utc::now();
        let ctx = self.load(path).await?;
        self.append_all(path, &ctx.notices).await?;

        let transcriber = self.transcriber(&ctx.config);
        let stage = self.stage(&ctx, transcriber.as_ref())?;

        let expanded = join_all(ctx.history.iter().map(|m| stage.expand_links(&m.content))).await;
        let mut messages = Self::system_prelude(&ctx)?;
        for (msg, enriched) in ctx.history.iter().zip(expanded) {
            self.append_all(path, &enriched.callouts).await?;
            messages.push(ChatMessage { content: enriched.content, ..msg.clone() });
        }

        if !ctx.prompt.is_empty() {
            let prompt = stage.enrich_prompt(&ctx.prompt).await;
            self.append_all(path, &prompt.callouts).await?;
            messages.push(message_for(&ctx.prompt_label, prompt.content, &ctx.opts));
        }

        let reply = self.stream_reply(&ctx, path, messages.clone()).await?;
        messages.push(ChatMessage::assistant(reply.clone()));

        let report = self.report(&ctx.config, &messages);
        let next_turn = format!("\n\n{}\n\n__{}:__ ", ctx.opts.separator, ctx.prompt_label);
        self.append(path, &format!("{}{next_turn}", report.callout())).await?;
        info!(tokens = report.total(), limit = report.limit, "chat complete");

        if ctx.config.whisper.delete_file {
            for reference in &ctx.transcripts {
                let Some(audio) = stage.locate(reference).await else { continue };
                if let Err(e) = self.services.disk.delete_file(&audio).await {
                    warn!(path = %audio.display(), "could not delete transcribed audio: {e:#}");
                }
            }
        }

        let finished = Utc::now();
        let disk = self.services.disk.as_ref();
        let call_log = match logs::write_call_log(disk, &ctx.config, &ctx.opts, &messages, finished).await {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("could not write call log: {e:#}");
                None
            }
        };
        let chat_log = match logs::write_chat_log(
            disk,
            &ctx.config,
            &ctx.opts,
            &ctx.stem(),
            &messages,
            started,
            finished,
        )
        .await
        {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("could not write chat log: {e:#}");
                None
            }
        };

        Ok(ChatOutcome { reply, report, call_log, chat_log })
    }

    /// Stream the completion into the document.  Failures become a `[!BUG]`
    /// callout and whatever arrived before them is kept.
    async fn stream_reply(&self, ctx: &Context, path: &Path, messages: Vec<ChatMessage>) -> anyhow::Result<String> {
        let provider = self.provider(&ctx.config)?;
        let req = CompletionRequest::from_config(&ctx.config.model, messages);
        debug!(provider = provider.name(), model = provider.model_name(), "requesting completion");

        let header = format!("\n\n__{}:__ ", ctx.config.model.label);
        let mut reply = String::new();
        let mut opened = false;

        let mut stream = match provider.complete(req).await {
            Ok(s) => s,
            Err(e) => {
                self.append(path, &callouts::bug(&format!("{e}"), &e)).await?;
                return Ok(reply);
            }
        };

        while let Some(event) = stream.next().await {
            match event {
                Ok(ResponseEvent::AssistantStart) => {
                    if !opened {
                        self.append(path, &header).await?;
                        opened = true;
                    }
                }
                Ok(ResponseEvent::TextDelta(delta)) if !delta.is_empty() => {
                    if !opened {
                        self.append(path, &header).await?;
                        opened = true;
                    }
                    self.append(path, &delta).await?;
                    reply.push_str(&delta);
                }
                Ok(ResponseEvent::Error(message)) => {
                    let err = anyhow!(message.clone());
                    self.append(path, &callouts::bug(&message, &err)).await?;
                    break;
                }
                Ok(ResponseEvent::Done) => break,
                Ok(_) => {}
                Err(e) => {
                    self.append(path, &callouts::bug(&format!("{e}"), &e)).await?;
                    break;
                }
            }
        }
        Ok(reply)
    }

    // ── process ───────────────────────────────────────────────────────────────

    /// Enrich history and prompt and append the token report.  No model call.
    pub async fn process(&self, path: &Path) -> anyhow::Result<TokenReport> {
        let ctx = self.load(path).await?;
        self.append_all(path, &ctx.notices).await?;

        let transcriber = self.transcriber(&ctx.config);
        let quiet = self.stage(&ctx, transcriber.as_ref())?.with_transcript_echo(false).with_audio_deletion(false);
        let loud = self.stage(&ctx, transcriber.as_ref())?.with_transcript_echo(true);

        let enriched = join_all(ctx.history.iter().map(|m| quiet.enrich_history(&m.content))).await;
        let mut messages = Vec::with_capacity(ctx.history.len() + 1);
        for (msg, e) in ctx.history.iter().zip(enriched) {
            self.append_all(path, &e.callouts).await?;
            messages.push(ChatMessage { content: e.content, ..msg.clone() });
        }

        if !ctx.prompt.is_empty() {
            let prompt = loud.enrich_history(&ctx.prompt).await;
            self.append_all(path, &prompt.callouts).await?;
            messages.push(message_for(&ctx.prompt_label, prompt.content, &ctx.opts));
        }

        let report = self.report(&ctx.config, &messages);
        self.append(path, &report.callout()).await?;
        Ok(report)
    }

    // ── prompt ────────────────────────────────────────────────────────────────

    /// Enrich only the text after the last separator and append the token
    /// report.  No model call.
    pub async fn prompt(&self, path: &Path) -> anyhow::Result<TokenReport> {
        let ctx = self.load(path).await?;
        self.append_all(path, &ctx.notices).await?;

        let marker = format!("\n{}", ctx.opts.separator);
        let tail = match ctx.body.rfind(&marker) {
            Some(at) => &ctx.body[at + marker.len()..],
            None => ctx.body.as_str(),
        };
        let loaded = load_content(tail, &ctx.opts);

        let transcriber = self.transcriber(&ctx.config);
        let stage = self.stage(&ctx, transcriber.as_ref())?.with_transcript_echo(true).with_audio_deletion(false);

        let mut messages = Vec::new();
        if !loaded.prompt.is_empty() {
            let prompt = stage.enrich_prompt(&loaded.prompt).await;
            self.append_all(path, &prompt.callouts).await?;
            messages.push(message_for(&loaded.prompt_label, prompt.content, &ctx.opts));
        }

        let report = self.report(&ctx.config, &messages);
        self.append(path, &report.callout()).await?;
        Ok(report)
    }

    // ── tokens ────────────────────────────────────────────────────────────────

    /// Token report for the messages `chat` would send, before enrichment.
    /// The document is not modified.
    pub async fn tokens(&self, path: &Path) -> anyhow::Result<TokenReport> {
        let ctx = self.load(path).await?;
        let mut messages = Self::system_prelude(&ctx)?;
        messages.extend(ctx.history.iter().cloned());
        if !ctx.prompt.is_empty() {
            messages.push(message_for(&ctx.prompt_label, ctx.prompt.clone(), &ctx.opts));
        }
        Ok(self.report(&ctx.config, &messages))
    }
}
