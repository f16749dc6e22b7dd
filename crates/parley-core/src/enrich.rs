// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Enrichment stages: link expansion, transcription and web browsing.
//!
//! Each stage reads message content and returns the rewritten content with
//! the callouts it wants appended to the document.  Only live text is
//! touched; fenced blocks and `<% … %>` template spans pass through.

use std::path::{Path, PathBuf};

use async_recursion::async_recursion;
use parley_config::Config;
use parley_input::{
    annotation::escape_markup,
    live::{self, Segment},
};
use parley_model::{Transcriber, TranscriptionRequest};
use regex::Regex;
use tracing::{debug, warn};

use crate::{
    callouts,
    disk::{base_name, ext_name, join_path, Disk},
    fetch::{PdfExtractor, WebFetcher},
};

pub const AUDIO_EXTENSIONS: &[&str] = &["flac", "mp3", "mp4", "mpeg", "mpga", "m4a", "ogg", "wav", "webm"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "ico", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["avi", "mpg", "mov", "mkv", "m4v", "wmv", "3gp"];
pub const BINARY_EXTENSIONS: &[&str] = &["bin", "exe", "iso", "doc", "xls", "ppt"];

/// Nesting limit for `.txt` files that embed further files.
const MAX_LINK_DEPTH: usize = 8;

/// Content produced by a stage plus callouts for the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enriched {
    pub content: String,
    pub callouts: Vec<String>,
}

struct Patterns {
    embed: Regex,
    audio: Regex,
    web: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            embed: Regex::new(r"!\[\[([^\]|]+?)(\|[^\]]*?)?\]\]")?,
            audio: Regex::new(&format!(
                r"(?i)!\[\[([^\]|]+?\.(?:{}))\]\]",
                AUDIO_EXTENSIONS.join("|")
            ))?,
            web: Regex::new(r"<(https?://[^\s>]+)>")?,
        })
    }
}

/// Placeholder found in live text.
struct Placeholder {
    full: String,
    target: String,
    alias: Option<String>,
}

fn placeholders(re: &Regex, text: &str) -> Vec<Placeholder> {
    let spans = live::template_spans(text);
    re.captures_iter(text)
        .filter_map(|c| {
            let full = c.get(0)?;
            if live::in_template(&spans, full.start()) {
                return None;
            }
            Some(Placeholder {
                full: full.as_str().to_string(),
                target: c.get(1)?.as_str().trim().to_string(),
                alias: c.get(2).map(|a| a.as_str()[1..].to_string()),
            })
        })
        .collect()
}

/// Shared state of the enrichment stages for one run.
pub struct Stage<'a> {
    pub disk: &'a dyn Disk,
    pub config: &'a Config,
    /// Directory of the document being processed
    pub doc_dir: &'a Path,
    pub transcriber: &'a dyn Transcriber,
    pub fetcher: &'a dyn WebFetcher,
    pub pdf: Option<&'a dyn PdfExtractor>,
    /// Echo fresh transcripts as `[!QUOTE]` callouts
    pub echo_transcripts: bool,
    pub delete_audio: bool,
    patterns: Patterns,
}

impl<'a> Stage<'a> {
    pub fn new(
        disk: &'a dyn Disk,
        config: &'a Config,
        doc_dir: &'a Path,
        transcriber: &'a dyn Transcriber,
        fetcher: &'a dyn WebFetcher,
        pdf: Option<&'a dyn PdfExtractor>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            disk,
            config,
            doc_dir,
            transcriber,
            fetcher,
            pdf,
            echo_transcripts: config.whisper.echo_output,
            delete_audio: config.whisper.delete_file,
            patterns: Patterns::compile()?,
        })
    }

    pub fn with_transcript_echo(mut self, echo: bool) -> Self {
        self.echo_transcripts = echo;
        self
    }

    pub fn with_audio_deletion(mut self, delete: bool) -> Self {
        self.delete_audio = delete;
        self
    }

    // ─── File resolution ─────────────────────────────────────────────────────

    /// Locate a linked file: as given, next to the document, in the vault,
    /// in the configs directory, then with `.md` for extensionless names.
    pub async fn locate(&self, target: &str) -> Option<PathBuf> {
        let mut bases: Vec<PathBuf> = vec![self.doc_dir.to_path_buf()];
        bases.extend(self.config.paths.vault_dir());
        bases.push(self.config.paths.configs_dir());

        let mut name = target.to_string();
        loop {
            let given = PathBuf::from(&name);
            if self.disk.path_exists(&given).await {
                return Some(given);
            }
            for base in &bases {
                let candidate = join_path(base, &name);
                if self.disk.path_exists(&candidate).await {
                    return Some(candidate);
                }
            }

            if ext_name(&name) == "txt" {
                name.truncate(name.len() - 4);
            }
            if !ext_name(&name).is_empty() {
                return None;
            }
            name.push_str(".md");
        }
    }

    async fn resolve(&self, target: &str, callouts: &mut Vec<String>) -> Option<PathBuf> {
        let found = self.locate(target).await;
        if found.is_none() {
            callouts.push(callouts::missing("Linked File Not Found", target));
        }
        found
    }

    // ─── Link expansion ──────────────────────────────────────────────────────

    /// Replace `![[file]]` embeds with the linked file's text.
    pub async fn expand_links(&self, content: &str) -> Enriched {
        self.expand_links_at(content.to_string(), 0).await
    }

    #[async_recursion]
    async fn expand_links_at(&self, content: String, depth: usize) -> Enriched {
        let mut callouts = Vec::new();
        let mut parts = Vec::new();
        for segment in live::segments(&content) {
            match segment {
                Segment::Fenced(text) => parts.push(text),
                Segment::Live(text) => parts.push(self.expand_live(text, depth, &mut callouts).await),
            }
        }
        Enriched { content: live::reassemble(parts), callouts }
    }

    async fn expand_live(&self, mut text: String, depth: usize, callouts: &mut Vec<String>) -> String {
        for link in placeholders(&self.patterns.embed, &text) {
            let ext = ext_name(&link.target);
            if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            let Some(path) = self.resolve(&link.target, callouts).await else { continue };

            let unsupported = if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                Some("Images Not Supported (yet)")
            } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
                Some("Video Files Not Supported")
            } else if BINARY_EXTENSIONS.contains(&ext.as_str()) {
                Some("Binary Files Not Supported")
            } else {
                None
            };
            if let Some(reason) = unsupported {
                callouts.push(callouts::missing(reason, &link.target));
                continue;
            }

            if ext == "pdf" {
                if let Some(wrapped) = self.extract_pdf(&link.target, &path, callouts).await {
                    text = text.replacen(&link.full, &wrapped, 1);
                }
                continue;
            }

            let file_text = match self.disk.read_file(&path).await {
                Ok(t) => t.trim().to_string(),
                Err(e) => {
                    callouts.push(callouts::bug("Linked File Unreadable", &e));
                    continue;
                }
            };
            let header = link.alias.clone().unwrap_or_else(|| base_name(&link.target));
            let expansion = match ext.as_str() {
                "txt" if depth < MAX_LINK_DEPTH => {
                    let nested = self.expand_links_at(file_text, depth + 1).await;
                    callouts.extend(nested.callouts);
                    nested.content
                }
                "txt" => {
                    warn!(target = %link.target, "link nesting too deep, leaving text as is");
                    file_text
                }
                "" => format!("{header}:\n\n\"\"\"\n{file_text}\n\"\"\""),
                _ => format!("{header}:\n\n```{ext}\n{file_text}\n```"),
            };
            debug!(target = %link.target, path = %path.display(), "expanded link");
            text = text.replacen(&link.full, &format!("{expansion}\n\n"), 1);
        }
        text
    }

    async fn extract_pdf(&self, target: &str, path: &Path, callouts: &mut Vec<String>) -> Option<String> {
        let Some(pdf) = self.pdf else {
            callouts.push(callouts::missing("PDFs Not Supported (soon)", target));
            return None;
        };
        let extracted = match self.disk.read_binary(path).await {
            Ok(bytes) => pdf.extract(&bytes).await,
            Err(e) => Err(e),
        };
        match extracted {
            Ok(text) if text.trim().is_empty() => {
                callouts.push(callouts::no_content(target));
                None
            }
            Ok(text) => {
                let text = text.trim();
                callouts.push(callouts::pdf_content(target, &escape_markup(text)));
                Some(format!("\"{target}\":\n\"\"\"\n{text}\n\"\"\"\n\n"))
            }
            Err(e) => {
                callouts.push(callouts::bug("PDF Extraction Failed", &e));
                None
            }
        }
    }

    // ─── Transcription ───────────────────────────────────────────────────────

    /// Replace `![[audio]]` embeds with their transcript.
    pub async fn transcribe(&self, content: &str) -> Enriched {
        let mut callouts = Vec::new();
        let mut parts = Vec::new();
        for segment in live::segments(content) {
            match segment {
                Segment::Fenced(text) => parts.push(text),
                Segment::Live(text) => parts.push(self.transcribe_live(text, &mut callouts).await),
            }
        }
        Enriched { content: live::reassemble(parts), callouts }
    }

    async fn transcribe_live(&self, mut text: String, callouts: &mut Vec<String>) -> String {
        let whisper = &self.config.whisper;
        for audio in placeholders(&self.patterns.audio, &text) {
            let Some(path) = self.resolve(&audio.target, callouts).await else { continue };

            let transcript = match self.disk.read_binary(&path).await {
                Ok(bytes) => {
                    let req = TranscriptionRequest {
                        audio: bytes,
                        file_name: base_name(&audio.target),
                        prompt: whisper.input.clone(),
                        language: whisper.language.clone(),
                        temperature: whisper.temperature,
                    };
                    self.transcriber.transcribe(req).await
                }
                Err(e) => Err(e),
            };
            let transcript = match transcript {
                Ok(t) => t.trim().to_string(),
                Err(e) => {
                    callouts.push(callouts::bug(&format!("{e}"), &e));
                    continue;
                }
            };
            if transcript.is_empty() {
                callouts.push(callouts::no_content(&audio.target));
                continue;
            }

            if self.delete_audio {
                if let Err(e) = self.disk.delete_file(&path).await {
                    warn!(path = %path.display(), "could not delete audio: {e:#}");
                }
            }
            if self.echo_transcripts {
                callouts.push(callouts::transcript(&audio.target, &transcript));
            }
            debug!(audio = %audio.target, chars = transcript.len(), "transcribed");
            text = text.replacen(&audio.full, &format!("\"{transcript}\" ({})", whisper.live_suffix), 1);
        }
        text
    }

    // ─── Web browsing ────────────────────────────────────────────────────────

    /// Replace `<https://…>` links with the page text.
    pub async fn browse(&self, content: &str) -> Enriched {
        let mut callouts = Vec::new();
        let mut parts = Vec::new();
        for segment in live::segments(content) {
            match segment {
                Segment::Fenced(text) => parts.push(text),
                Segment::Live(text) => parts.push(self.browse_live(text, &mut callouts).await),
            }
        }
        Enriched { content: live::reassemble(parts), callouts }
    }

    async fn browse_live(&self, mut text: String, callouts: &mut Vec<String>) -> String {
        for link in placeholders(&self.patterns.web, &text) {
            let url = link.target;
            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page.to_markdown(),
                Err(e) => {
                    callouts.push(callouts::bug(&format!("{e}"), &e));
                    continue;
                }
            };
            if page.is_empty() {
                callouts.push(callouts::no_content(&url));
                continue;
            }
            callouts.push(callouts::web_page(&url, &escape_markup(&page)));
            debug!(url = %url, chars = page.len(), "browsed");
            text = text.replacen(&link.full, &format!("@\"{url}\"\n\"\"\"\n{page}\n\"\"\"\n\n"), 1);
        }
        text
    }

    /// Transcription, then link expansion, then web browsing.
    pub async fn enrich_prompt(&self, content: &str) -> Enriched {
        let mut callouts = Vec::new();
        let transcribed = self.transcribe(content).await;
        callouts.extend(transcribed.callouts);
        let expanded = self.expand_links(&transcribed.content).await;
        callouts.extend(expanded.callouts);
        let browsed = self.browse(&expanded.content).await;
        callouts.extend(browsed.callouts);
        Enriched { content: browsed.content, callouts }
    }

    /// Transcription, then link expansion.
    pub async fn enrich_history(&self, content: &str) -> Enriched {
        let transcribed = self.transcribe(content).await;
        let expanded = self.expand_links(&transcribed.content).await;
        let mut callouts = transcribed.callouts;
        callouts.extend(expanded.callouts);
        Enriched { content: expanded.content, callouts }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
