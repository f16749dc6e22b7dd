// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Conversation documents: parsing Markdown into chat messages and back.
//!
//! A document is a sequence of turns separated by a separator line (`---` by
//! default).  A turn may open with a speaker label such as `__Martin:__`;
//! unlabeled turns belong to the most recent user speaker.  Block quotes are
//! never message content, but annotation callouts inside them fill in
//! transcripts and fetched content referenced from the turn.

pub mod annotation;
pub mod builder;
pub mod frontmatter;
pub mod live;
pub mod scanner;
pub mod segment;
pub mod serialize;

pub use annotation::{Annotation, AnnotationKind};
pub use builder::{message_for, role_for_label};
pub use frontmatter::{parse_document, FrontMatter};
pub use segment::{segment, Turn};
pub use serialize::{message_label, render_message, serialize_history};

use parley_config::Config;
use parley_model::{ChatMessage, Role};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid front-matter: {0}")]
    FrontMatter(String),
    #[error("front-matter must be a mapping")]
    FrontMatterShape,
}

/// Document conventions needed to parse and render a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub separator: String,
    /// Label of unlabeled user turns
    pub user_label: String,
    pub assistant_label: String,
    /// Suffix appended to transcripts substituted from annotations
    pub read_suffix: String,
}

impl ParseOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            separator: cfg.document.separator.clone(),
            user_label: cfg.user.label.clone(),
            assistant_label: cfg.model.label.clone(),
            read_suffix: cfg.whisper.read_suffix.clone(),
        }
    }

    pub fn with_user_label(mut self, label: impl Into<String>) -> Self {
        self.user_label = label.into();
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Messages parsed from a document body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHistory {
    pub messages: Vec<ChatMessage>,
    /// Transcript references whose annotation replaced a placeholder
    pub transcripts: Vec<String>,
}

/// Parse a document body (front-matter already removed) into messages.
pub fn parse_history(text: &str, opts: &ParseOptions) -> ParsedHistory {
    let turns = segment(text, opts);
    let built = builder::build_messages(&turns, opts);
    tracing::debug!(turns = turns.len(), messages = built.messages.len(), "parsed history");
    ParsedHistory { messages: built.messages, transcripts: built.transcripts }
}

/// History split into prior turns and the pending prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedContent {
    pub history: Vec<ChatMessage>,
    /// Content of the trailing user turn, empty when the document does not
    /// end with one
    pub prompt: String,
    /// Speaker label of the prompt
    pub prompt_label: String,
    pub transcripts: Vec<String>,
}

/// Parse `text` and detach the trailing user message as the prompt.
///
/// Wiki-links in system messages and in the prompt are promoted to embeds so
/// link expansion picks them up.
pub fn load_content(text: &str, opts: &ParseOptions) -> LoadedContent {
    let ParsedHistory { mut messages, transcripts } = parse_history(text, opts);

    for msg in messages.iter_mut().filter(|m| m.role == Role::System) {
        msg.content = live::promote_wiki_links(&msg.content);
    }

    let (prompt, prompt_label) = match messages.last() {
        Some(last) if last.role == Role::User => {
            let label = last.name.clone().unwrap_or_else(|| opts.user_label.clone());
            let prompt = live::promote_wiki_links(&last.content);
            messages.pop();
            (prompt, label)
        }
        _ => (String::new(), opts.user_label.clone()),
    };

    LoadedContent { history: messages, prompt, prompt_label, transcripts }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn options_follow_config() {
        let mut cfg = Config::default();
        cfg.model.label = "Gladdis".into();
        cfg.document.separator = "***".into();
        let o = ParseOptions::from_config(&cfg);
        assert_eq!(o.assistant_label, "Gladdis");
        assert_eq!(o.separator, "***");
        assert_eq!(o.user_label, "User");
    }

    #[test]
    fn trailing_user_turn_becomes_prompt() {
        let text = "__System:__ Read [[style]].\n---\n__User:__ Hi\n---\n__Parley:__ Hello\n---\n__Ada:__ Check [[notes]]";
        let loaded = load_content(text, &ParseOptions::default());
        assert_eq!(loaded.prompt, "Check ![[notes]]");
        assert_eq!(loaded.prompt_label, "Ada");
        assert_eq!(
            loaded.history,
            vec![
                ChatMessage::system("Read ![[style]]."),
                ChatMessage::user("Hi"),
                ChatMessage::assistant("Hello"),
            ]
        );
    }

    #[test]
    fn document_ending_with_assistant_has_empty_prompt() {
        let loaded = load_content("__User:__ Hi\n---\n__Parley:__ Hello", &ParseOptions::default());
        assert_eq!(loaded.prompt, "");
        assert_eq!(loaded.prompt_label, "User");
        assert_eq!(loaded.history.len(), 2);
    }

    #[test]
    fn history_wiki_links_outside_system_are_untouched() {
        let loaded = load_content("See [[a]]\n---\n__Parley:__ ok", &ParseOptions::default());
        assert_eq!(loaded.history[0].content, "See [[a]]");
    }

    #[test]
    fn config_document_parses_as_system() {
        let opts = ParseOptions::default().with_user_label("System");
        let parsed = parse_history("You are a reviewer.\n---\nBe strict.", &opts);
        assert_eq!(
            parsed.messages,
            vec![ChatMessage::system("You are a reviewer."), ChatMessage::system("Be strict.")]
        );
    }

    #[test]
    fn empty_document_has_no_messages() {
        assert!(parse_history("", &ParseOptions::default()).messages.is_empty());
        assert!(parse_history("\n---\n\n---\n", &ParseOptions::default()).messages.is_empty());
    }

    #[test]
    fn consumed_transcripts_are_reported() {
        let text = "![[a.mp3]]\n> [!QUOTE]- Transcript from \"a.mp3\"\n> words";
        let parsed = parse_history(text, &ParseOptions::default());
        assert_eq!(parsed.transcripts, vec!["a.mp3".to_string()]);
    }

    #[test]
    fn empty_turns_between_separators_are_dropped() {
        let parsed = parse_history("A\n---\n---\nB", &ParseOptions::default());
        assert_eq!(parsed.messages, vec![ChatMessage::user("A"), ChatMessage::user("B")]);
    }

    #[test]
    fn unlabeled_turn_keeps_the_last_speaker() {
        let parsed = parse_history("__Myself:__ A\n---\nB", &ParseOptions::default());
        assert_eq!(
            parsed.messages,
            vec![ChatMessage::named_user("Myself", "A"), ChatMessage::named_user("Myself", "B")]
        );
    }

    #[test]
    fn unmatched_placeholder_stays_in_place() {
        let parsed = parse_history("![[audio.mp3]]", &ParseOptions::default());
        assert_eq!(parsed.messages, vec![ChatMessage::user("![[audio.mp3]]")]);
        assert!(parsed.transcripts.is_empty());
    }

    #[test]
    fn separated_quote_groups_fill_separate_placeholders() {
        let text = "![[a.mp3]] ![[b.mp3]]\n\
                    > [!QUOTE]- Transcript from \"a.mp3\"\n> one\n\n\
                    > [!QUOTE]- Transcript from \"b.mp3\"\n> two";
        let parsed = parse_history(text, &ParseOptions::default());
        assert_eq!(
            parsed.messages,
            vec![ChatMessage::user("\"one\" (transcribed and read) \"two\" (transcribed and read)")]
        );
        assert_eq!(parsed.transcripts, vec!["a.mp3".to_string(), "b.mp3".to_string()]);
    }

    #[test]
    fn separator_inside_code_fence_does_not_split() {
        let parsed = parse_history("```\n---\n```", &ParseOptions::default());
        assert_eq!(parsed.messages, vec![ChatMessage::user("```\n---\n```")]);
    }
}
