//! Splitting a document body into labeled turns.

use parley_model::Role;

use crate::{
    builder::role_for_label,
    scanner::{LineKind, Scanner},
    ParseOptions,
};

/// One speaker turn before annotation resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Turn {
    pub label: String,
    /// Body lines, fence lines included, block quotes excluded
    pub body: Vec<String>,
    /// Maximal runs of contiguous block-quote lines, in document order
    pub quotes: Vec<Vec<String>>,
}

impl Turn {
    fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), body: Vec::new(), quotes: vec![Vec::new()] }
    }

    /// Body text with surrounding whitespace trimmed.
    pub fn content(&self) -> String {
        self.body.join("\n").trim().to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.body.iter().all(|l| l.trim().is_empty())
    }

    /// Quote groups that actually hold lines.
    pub fn quote_groups(&self) -> impl Iterator<Item = &[String]> {
        self.quotes.iter().filter(|g| !g.is_empty()).map(Vec::as_slice)
    }

    fn push_quote(&mut self, line: &str) {
        if let Some(group) = self.quotes.last_mut() {
            group.push(line.to_string());
        }
    }

    fn push_body(&mut self, line: &str) {
        // Any non-quote line ends the running quote group.
        if self.quotes.last().is_some_and(|g| !g.is_empty()) {
            self.quotes.push(Vec::new());
        }
        self.body.push(line.to_string());
    }
}

/// Segment `text` into turns.
///
/// Turns whose body is blank are dropped together with their quotes.  A turn
/// that follows a separator without a label is attributed to the most recent
/// explicit user speaker, or to the default user label when there is none.
/// An unterminated fence runs to the end of the document and the final turn
/// is still emitted.
pub fn segment(text: &str, opts: &ParseOptions) -> Vec<Turn> {
    let mut scanner = Scanner::new(&opts.separator);
    let mut turns = Vec::new();
    let mut speaker = opts.user_label.clone();
    let mut current = Turn::new(speaker.clone());

    for line in text.lines() {
        match scanner.classify(line) {
            LineKind::Separator => {
                flush(&mut turns, std::mem::replace(&mut current, Turn::new(speaker.clone())));
            }
            LineKind::BlockQuote(quoted) => current.push_quote(quoted),
            LineKind::Label { name, rest } => {
                flush(&mut turns, std::mem::replace(&mut current, Turn::new(name)));
                if role_for_label(name, opts) == Role::User {
                    speaker = name.to_string();
                }
                scanner.continue_after_label(rest);
                current.push_body(rest);
            }
            LineKind::Plain
            | LineKind::FenceOpen(_)
            | LineKind::FenceBody(_)
            | LineKind::FenceClose(_) => current.push_body(line),
        }
    }
    flush(&mut turns, current);
    turns
}

fn flush(turns: &mut Vec<Turn>, turn: Turn) {
    if turn.is_empty() {
        if turn.quote_groups().next().is_some() {
            tracing::debug!(label = %turn.label, "dropping empty turn with quotes");
        }
        return;
    }
    turns.push(turn);
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
