// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Token accounting and the context-usage report.

use std::fmt;

use parley_config::ModelConfig;
use parley_model::{catalog, ChatMessage, Role};

/// Cells in the usage bar.
pub const BAR_CELLS: usize = 36;
/// Tokens added per message for role and framing.
pub const MESSAGE_OVERHEAD: usize = 3;

pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
    fn name(&self) -> &str;
}

/// BPE tokenizer from tiktoken.
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
    name: String,
}

impl TiktokenTokenizer {
    /// Tokenizer for `model`, falling back to cl100k_base for models
    /// tiktoken does not know.
    pub fn for_model(model: &str) -> anyhow::Result<Self> {
        match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => Ok(Self { bpe, name: model.to_string() }),
            Err(_) => Self::cl100k(),
        }
    }

    pub fn cl100k() -> anyhow::Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()?;
        Ok(Self { bpe, name: "cl100k_base".to_string() })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Counts whitespace-separated words.  Deterministic stand-in for tests and
/// for runs where no BPE table can be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &str {
        "words"
    }
}

/// Context limit for the configured model.  An explicit `context_window`
/// wins over the catalog.
pub fn context_limit(cfg: &ModelConfig) -> usize {
    cfg.context_window
        .unwrap_or_else(|| catalog::context_window(&cfg.name, catalog::DEFAULT_CONTEXT_WINDOW)) as usize
}

pub fn message_tokens(tokenizer: &dyn Tokenizer, msg: &ChatMessage) -> usize {
    tokenizer.count_tokens(&format!("{}\n{}", msg.speaker(), msg.content)) + MESSAGE_OVERHEAD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Note,
    Warning,
    Danger,
}

impl Severity {
    /// `Danger` above 91 % of the limit, `Warning` from 61 %.
    ///
    /// Thresholds are whole percents of the limit, not the 22/36 and 33/36
    /// cells of the usage bar, so 91.2 % already counts as `Danger`.
    pub fn classify(used: usize, limit: usize) -> Self {
        let limit = limit.max(1);
        if used * 100 > limit * 91 {
            Severity::Danger
        } else if used * 100 >= limit * 61 {
            Severity::Warning
        } else {
            Severity::Note
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Severity::Note => "NOTE",
            Severity::Warning => "WARNING",
            Severity::Danger => "DANGER",
        }
    }
}

/// Token usage split into bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenReport {
    /// Leading system messages
    pub system: usize,
    pub conversation: usize,
    /// Trailing user message
    pub prompt: usize,
    pub limit: usize,
}

impl TokenReport {
    pub fn measure(messages: &[ChatMessage], tokenizer: &dyn Tokenizer, limit: usize) -> Self {
        let lead = messages.iter().take_while(|m| m.role == Role::System).count();
        let tail = match messages.last() {
            Some(m) if m.role == Role::User && messages.len() > lead => 1,
            _ => 0,
        };
        let count = |slice: &[ChatMessage]| -> usize {
            slice.iter().map(|m| message_tokens(tokenizer, m)).sum()
        };
        let split = messages.len() - tail;
        Self {
            system: count(&messages[..lead]),
            conversation: count(&messages[lead..split]),
            prompt: count(&messages[split..]),
            limit,
        }
    }

    pub fn total(&self) -> usize {
        self.system + self.conversation + self.prompt
    }

    pub fn severity(&self) -> Severity {
        Severity::classify(self.total(), self.limit)
    }

    /// `[**==##+**---]`
    pub fn bar(&self) -> String {
        let cells = |tokens: usize| -> usize {
            let limit = self.limit.max(1);
            tokens.saturating_mul(BAR_CELLS).div_ceil(limit).min(BAR_CELLS)
        };
        let sys = cells(self.system);
        let conv = cells(self.system + self.conversation);
        let used = cells(self.total());
        format!(
            "[**{}{}{}**{}]",
            "=".repeat(sys),
            "#".repeat(conv - sys),
            "+".repeat(used - conv),
            "-".repeat(BAR_CELLS - used)
        )
    }

    /// Callout appended to the document.
    pub fn callout(&self) -> String {
        format!(
            "\n\n> [!{}]- {}\n> Using **{}** tokens out of **{}** max tokens.\n> System {} · Conversation {} · Prompt {}",
            self.severity().tag(),
            self.bar(),
            thousands(self.total()),
            thousands(self.limit),
            thousands(self.system),
            thousands(self.conversation),
            thousands(self.prompt),
        )
    }
}

impl fmt::Display for TokenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} / {} tokens (system {}, conversation {}, prompt {})",
            self.severity().tag(),
            thousands(self.total()),
            thousands(self.limit),
            thousands(self.system),
            thousands(self.conversation),
            thousands(self.prompt),
        )
    }
}

/// `1234567` → `1,234,567`
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
