//! Rendering messages back into document text.

use parley_model::{ChatMessage, Role};

use crate::ParseOptions;

/// Speaker label that round-trips to `msg` under `opts`.
pub fn message_label<'a>(msg: &'a ChatMessage, opts: &'a ParseOptions) -> &'a str {
    match msg.role {
        Role::System => "System",
        Role::Assistant => &opts.assistant_label,
        Role::User => msg.name.as_deref().unwrap_or(&opts.user_label),
    }
}

/// `__Label:__ content`
pub fn render_message(msg: &ChatMessage, opts: &ParseOptions) -> String {
    format!("__{}:__ {}", message_label(msg, opts), msg.content)
}

/// Render `messages` as a document body.  Parsing the result with the same
/// options yields the same messages, provided no content contains separator
/// lines or labels outside fences.
pub fn serialize_history(messages: &[ChatMessage], opts: &ParseOptions) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let joiner = format!("\n\n{}\n\n", opts.separator);
    let mut out = messages
        .iter()
        .map(|m| render_message(m, opts))
        .collect::<Vec<_>>()
        .join(&joiner);
    out.push('\n');
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parse_history;

    fn opts() -> ParseOptions {
        ParseOptions::default()
    }

    #[test]
    fn renders_labels_and_separators() {
        let msgs = vec![
            ChatMessage::system("Rules."),
            ChatMessage::named_user("Martin", "Hi"),
            ChatMessage::assistant("Hello"),
        ];
        assert_eq!(
            serialize_history(&msgs, &opts()),
            "__System:__ Rules.\n\n---\n\n__Martin:__ Hi\n\n---\n\n__Parley:__ Hello\n"
        );
    }

    #[test]
    fn empty_history_renders_nothing() {
        assert_eq!(serialize_history(&[], &opts()), "");
    }

    #[test]
    fn round_trip_preserves_messages() {
        let msgs = vec![
            ChatMessage::system("You are helpful.\n\nAlways cite."),
            ChatMessage::user("Show code"),
            ChatMessage::assistant("```rust\n---\n__User:__ inert\n```"),
            ChatMessage::named_user("Ada", "Thanks"),
        ];
        let text = serialize_history(&msgs, &opts());
        assert_eq!(parse_history(&text, &opts()).messages, msgs);
    }

    #[test]
    fn round_trip_with_custom_labels() {
        let o = ParseOptions {
            separator: "***".into(),
            user_label: "Me".into(),
            assistant_label: "Bot".into(),
            ..opts()
        };
        let msgs = vec![ChatMessage::user("q"), ChatMessage::assistant("a"), ChatMessage::named_user("User", "r")];
        let text = serialize_history(&msgs, &o);
        assert!(text.contains("__Me:__ q"));
        assert_eq!(parse_history(&text, &o).messages, msgs);
    }
}
