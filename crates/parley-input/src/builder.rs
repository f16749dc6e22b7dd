//! Turning resolved turns into chat messages.

use parley_model::{ChatMessage, Role};

use crate::{
    annotation,
    scanner::{LineKind, Scanner},
    segment::Turn,
    ParseOptions,
};

/// Role of a speaker label.
///
/// The assistant label and `system` match case-insensitively; every other
/// label is a user.
pub fn role_for_label(label: &str, opts: &ParseOptions) -> Role {
    if same_label(label, &opts.assistant_label) {
        Role::Assistant
    } else if same_label(label, "system") {
        Role::System
    } else {
        Role::User
    }
}

/// Message for `content` spoken under `label`.  User messages carry the
/// label as `name` unless it is the default user label.
pub fn message_for(label: &str, content: impl Into<String>, opts: &ParseOptions) -> ChatMessage {
    let content = content.into();
    match role_for_label(label, opts) {
        Role::Assistant => ChatMessage::assistant(content),
        Role::System => ChatMessage::system(content),
        Role::User if same_label(label, &opts.user_label) => ChatMessage::user(content),
        Role::User => ChatMessage::named_user(label, content),
    }
}

pub(crate) fn same_label(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Messages plus the transcript references consumed while resolving them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Built {
    pub messages: Vec<ChatMessage>,
    pub transcripts: Vec<String>,
}

/// Resolve annotations in every turn and emit one message per turn, or more
/// when resolved content starts a line with another speaker label.
pub fn build_messages(turns: &[Turn], opts: &ParseOptions) -> Built {
    let mut built = Built::default();
    for turn in turns {
        let resolved = annotation::resolve(&turn.content(), turn.quote_groups(), &opts.read_suffix);
        built.transcripts.extend(resolved.transcripts);
        emit(&turn.label, &resolved.content, opts, &mut built.messages);
    }
    built
}

fn emit(label: &str, content: &str, opts: &ParseOptions, out: &mut Vec<ChatMessage>) {
    let mut label = label.to_string();
    let mut rest = content.to_string();
    loop {
        match split_at_label(&rest, &opts.separator) {
            Some(split) => {
                push_message(&label, &split.head, opts, out);
                label = split.label;
                rest = split.tail;
            }
            None => {
                push_message(&label, &rest, opts, out);
                return;
            }
        }
    }
}

fn push_message(label: &str, content: &str, opts: &ParseOptions, out: &mut Vec<ChatMessage>) {
    let content = content.trim();
    if !content.is_empty() {
        out.push(message_for(label, content, opts));
    }
}

struct LabelSplit {
    head: String,
    label: String,
    tail: String,
}

/// Find the first unfenced line starting with a speaker label.
fn split_at_label(content: &str, separator: &str) -> Option<LabelSplit> {
    let mut scanner = Scanner::new(separator);
    let lines: Vec<&str> = content.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if let LineKind::Label { name, rest } = scanner.classify(line) {
            let mut tail = vec![rest];
            tail.extend_from_slice(&lines[i + 1..]);
            return Some(LabelSplit {
                head: lines[..i].join("\n"),
                label: name.to_string(),
                tail: tail.join("\n"),
            });
        }
    }
    None
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
