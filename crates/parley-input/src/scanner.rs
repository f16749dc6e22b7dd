// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Line classification for conversation documents.
//!
//! The scanner is a three-state machine:
//!
//! | state       | line                                 | kind          | next state  |
//! |-------------|--------------------------------------|---------------|-------------|
//! | `Plain`     | starts with a fence marker, stays open | `FenceOpen` | fence state |
//! | `Plain`     | trimmed text equals the separator    | `Separator`   | `Plain`     |
//! | `Plain`     | starts with `>`                      | `BlockQuote`  | `Plain`     |
//! | `Plain`     | starts with `__Name:__`              | `Label`       | `Plain`     |
//! | `Plain`     | anything else                        | `Plain`       | `Plain`     |
//! | `*Fence`    | ends with the open fence's marker    | `FenceClose`  | `Plain`     |
//! | `*Fence`    | anything else                        | `FenceBody`   | unchanged   |
//!
//! Fence detection has priority over every other rule, so separators, quotes
//! and labels inside a fence are inert.

/// Marker of a code fence.
pub const CODE_FENCE: &str = "```";
/// Marker of a triple-quoted text block.
pub const TEXT_FENCE: &str = "\"\"\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fence {
    Code,
    Text,
}

impl Fence {
    pub fn marker(self) -> &'static str {
        match self {
            Fence::Code => CODE_FENCE,
            Fence::Text => TEXT_FENCE,
        }
    }

    /// The fence a line starts with, ignoring leading whitespace.
    fn starting(line: &str) -> Option<Fence> {
        let start = line.trim_start();
        if start.starts_with(CODE_FENCE) {
            Some(Fence::Code)
        } else if start.starts_with(TEXT_FENCE) {
            Some(Fence::Text)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Plain,
    CodeFence,
    TextFence,
}

impl ScanState {
    fn open(fence: Fence) -> Self {
        match fence {
            Fence::Code => ScanState::CodeFence,
            Fence::Text => ScanState::TextFence,
        }
    }

    fn fence(self) -> Option<Fence> {
        match self {
            ScanState::Plain => None,
            ScanState::CodeFence => Some(Fence::Code),
            ScanState::TextFence => Some(Fence::Text),
        }
    }
}

/// Classification of one physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Plain,
    FenceOpen(Fence),
    FenceBody(Fence),
    FenceClose(Fence),
    /// Block-quote text with the `>` and at most one following space removed
    BlockQuote(&'a str),
    Separator,
    /// `__name:__ rest`
    Label { name: &'a str, rest: &'a str },
}

impl LineKind<'_> {
    /// Whether the line belongs to a fenced region (delimiters included).
    pub fn is_fenced(&self) -> bool {
        matches!(self, LineKind::FenceOpen(_) | LineKind::FenceBody(_) | LineKind::FenceClose(_))
    }
}

/// Stateful line classifier.
#[derive(Debug, Clone)]
pub struct Scanner<'s> {
    separator: &'s str,
    state: ScanState,
}

impl<'s> Scanner<'s> {
    pub fn new(separator: &'s str) -> Self {
        Self { separator: separator.trim(), state: ScanState::Plain }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Classify `line` and advance the state machine.
    pub fn classify<'a>(&mut self, line: &'a str) -> LineKind<'a> {
        if let Some(fence) = self.state.fence() {
            if line.trim_end().ends_with(fence.marker()) {
                self.state = ScanState::Plain;
                return LineKind::FenceClose(fence);
            }
            return LineKind::FenceBody(fence);
        }

        if let Some(fence) = Fence::starting(line) {
            if opens_region(line, fence) {
                self.state = ScanState::open(fence);
                return LineKind::FenceOpen(fence);
            }
            // A fence that opens and closes on the same line is ordinary text.
            return LineKind::Plain;
        }

        if !self.separator.is_empty() && line.trim() == self.separator {
            return LineKind::Separator;
        }

        if let Some(quoted) = line.strip_prefix('>') {
            return LineKind::BlockQuote(quoted.strip_prefix(' ').unwrap_or(quoted));
        }

        if let Some((name, rest)) = match_label(line) {
            return LineKind::Label { name, rest };
        }

        LineKind::Plain
    }

    /// Track a fence opened by text that follows a label on the same line.
    pub fn continue_after_label(&mut self, rest: &str) {
        if self.state != ScanState::Plain {
            return;
        }
        if let Some(fence) = Fence::starting(rest) {
            if opens_region(rest, fence) {
                self.state = ScanState::open(fence);
            }
        }
    }
}

/// A fence line leaves the region open unless it also ends with the marker.
/// A bare marker always opens.
fn opens_region(line: &str, fence: Fence) -> bool {
    let marker = fence.marker();
    line.trim() == marker || !line.trim_end().ends_with(marker)
}

/// Match a speaker label anchored at the start of `line`.
///
/// The name is the shortest non-empty text between the leading `__` and the
/// first following `:__`.  One space after the label is consumed.
pub fn match_label(line: &str) -> Option<(&str, &str)> {
    let after_open = line.strip_prefix("__")?;
    // Skip the first char so the name is never empty.
    let first_len = after_open.chars().next()?.len_utf8();
    let close = after_open[first_len..].find(":__")? + first_len;
    let name = &after_open[..close];
    let rest = &after_open[close + 3..];
    Some((name, rest.strip_prefix(' ').unwrap_or(rest)))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
