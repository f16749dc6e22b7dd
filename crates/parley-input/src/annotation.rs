// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Callout annotations that carry previously fetched content.
//!
//! Three callout kinds are understood when they head a quote group:
//!
//! ```text
//! > [!QUOTE]- Transcript from "memo.mp3"
//! > [!ABSTRACT]- Content from "paper.pdf"
//! > [!EXAMPLE]- Web Page from <https://example.com>
//! ```
//!
//! Matching is case-insensitive and the fold marker (`+` or `-`) is optional.
//! The remaining lines of the group are the payload.

/// Zero-width no-break space inserted after `<` so echoed HTML-like text
/// renders inert.
pub const MARKUP_SENTINEL: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Transcript,
    PdfContent,
    WebContent,
}

impl AnnotationKind {
    /// Callout tag written when echoing this kind.
    pub fn tag(self) -> &'static str {
        match self {
            AnnotationKind::Transcript => "QUOTE",
            AnnotationKind::PdfContent => "ABSTRACT",
            AnnotationKind::WebContent => "EXAMPLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub reference: String,
    pub payload: String,
}

/// Canonical folded header line for `kind`, without the leading `> `.
pub fn header(kind: AnnotationKind, reference: &str) -> String {
    match kind {
        AnnotationKind::Transcript => format!("[!QUOTE]- Transcript from \"{reference}\""),
        AnnotationKind::PdfContent => format!("[!ABSTRACT]- Content from \"{reference}\""),
        AnnotationKind::WebContent => format!("[!EXAMPLE]- Web Page from <{reference}>"),
    }
}

/// Recognise an annotation header line.
pub fn parse_header(line: &str) -> Option<(AnnotationKind, String)> {
    let line = line.trim();
    if let Some(rest) = callout_body(line, "QUOTE") {
        let reference = strip_prefix_ci(rest, "Transcript from ").and_then(quoted)?;
        return Some((AnnotationKind::Transcript, reference.to_string()));
    }
    if let Some(rest) = callout_body(line, "ABSTRACT") {
        let reference = strip_prefix_ci(rest, "Content from ").and_then(quoted)?;
        if !ends_with_ci(reference, ".pdf") {
            return None;
        }
        return Some((AnnotationKind::PdfContent, reference.to_string()));
    }
    if let Some(rest) = callout_body(line, "EXAMPLE") {
        let url = if let Some(r) = strip_prefix_ci(rest, "Web Page from ") {
            angled(r)?
        } else {
            // Older documents wrote web content like file content.
            strip_prefix_ci(rest, "Content from ").and_then(quoted)?
        };
        if !is_http_url(url) {
            return None;
        }
        return Some((AnnotationKind::WebContent, url.to_string()));
    }
    None
}

/// Interpret a quote group.  Returns `None` when its first line is not an
/// annotation header.
pub fn parse_annotation(group: &[String]) -> Option<Annotation> {
    let (first, rest) = group.split_first()?;
    let (kind, reference) = parse_header(first)?;
    let payload = rest.join("\n").trim().to_string();
    let payload = match kind {
        AnnotationKind::Transcript => payload,
        AnnotationKind::PdfContent | AnnotationKind::WebContent => unescape_markup(&payload),
    };
    Some(Annotation { kind, reference, payload })
}

/// Result of substituting annotations into a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub content: String,
    /// References of transcripts that replaced a placeholder
    pub transcripts: Vec<String>,
}

/// Substitute every annotation in `groups` into `body`.
///
/// Each annotation replaces only the first occurrence of its placeholder.
/// Annotations without a placeholder in the body change nothing.
pub fn resolve<'g>(
    body: &str,
    groups: impl IntoIterator<Item = &'g [String]>,
    read_suffix: &str,
) -> Resolution {
    let mut content = body.to_string();
    let mut transcripts = Vec::new();

    for annotation in groups.into_iter().filter_map(parse_annotation) {
        let reference = annotation.reference.as_str();
        match annotation.kind {
            AnnotationKind::Transcript => {
                let placeholder = format!("![[{reference}]]");
                let quoted = format!("\"{}\" ({read_suffix})", annotation.payload);
                if replace_first(&mut content, &placeholder, &quoted) {
                    transcripts.push(annotation.reference.clone());
                }
            }
            AnnotationKind::PdfContent => {
                let wrapped = format!("\"{reference}\":\n\"\"\"\n{}\n\"\"\"\n\n", annotation.payload);
                replace_first(&mut content, &format!("![[{reference}]]"), &wrapped);
                replace_first(&mut content, &format!("[[{reference}]]"), &wrapped);
            }
            AnnotationKind::WebContent => {
                let wrapped = format!("@\"{reference}\"\n\"\"\"\n{}\n\"\"\"\n\n", annotation.payload);
                replace_first(&mut content, &format!("<{reference}>"), &wrapped);
            }
        }
    }

    Resolution { content: content.trim().to_string(), transcripts }
}

/// Insert [`MARKUP_SENTINEL`] after every `<` that starts a tag, closing tag
/// or `<!`.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '<' {
            let mut ahead = chars.clone();
            let next = match ahead.next() {
                Some('/') => ahead.next(),
                other => other,
            };
            if next.is_some_and(|n| n == '!' || n.is_ascii_alphabetic()) {
                out.push(MARKUP_SENTINEL);
            }
        }
    }
    out
}

pub fn unescape_markup(text: &str) -> String {
    text.replace(&format!("<{MARKUP_SENTINEL}"), "<")
}

fn replace_first(haystack: &mut String, needle: &str, replacement: &str) -> bool {
    match haystack.find(needle) {
        Some(at) => {
            haystack.replace_range(at..at + needle.len(), replacement);
            true
        }
        None => false,
    }
}

/// `[!TAG]` with an optional `+`/`-` and a single space, case-insensitive.
fn callout_body<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let rest = strip_prefix_ci(line, "[!")?;
    let rest = strip_prefix_ci(rest, tag)?;
    let rest = rest.strip_prefix(']')?;
    let rest = rest.strip_prefix(|c| c == '+' || c == '-').unwrap_or(rest);
    rest.strip_prefix(' ')
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn ends_with_ci(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.get(s.len() - suffix.len()..).is_some_and(|t| t.eq_ignore_ascii_case(suffix))
}

/// `"ref"` spanning the rest of the line.
fn quoted(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('"')?.strip_suffix('"')?;
    (!inner.is_empty() && !inner.contains('"')).then_some(inner)
}

/// `<url>` spanning the rest of the line.
fn angled(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('<')?.strip_suffix('>')?;
    (!inner.is_empty() && !inner.contains('>')).then_some(inner)
}

fn is_http_url(s: &str) -> bool {
    strip_prefix_ci(s, "https://").or_else(|| strip_prefix_ci(s, "http://")).is_some_and(|r| !r.is_empty())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn group(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn headers_are_case_insensitive_and_marker_optional() {
        for line in [
            "[!QUOTE]- Transcript from \"a.mp3\"",
            "[!quote]+ transcript from \"a.mp3\"",
            "[!Quote] Transcript From \"a.mp3\"",
        ] {
            assert_eq!(parse_header(line), Some((AnnotationKind::Transcript, "a.mp3".into())));
        }
    }

    #[test]
    fn pdf_header_requires_pdf_reference() {
        assert_eq!(
            parse_header("[!ABSTRACT]- Content from \"doc.PDF\""),
            Some((AnnotationKind::PdfContent, "doc.PDF".into()))
        );
        assert_eq!(parse_header("[!ABSTRACT]- Content from \"notes.md\""), None);
    }

    #[test]
    fn web_header_accepts_angle_and_legacy_forms() {
        let expected = Some((AnnotationKind::WebContent, "https://example.com/a".into()));
        assert_eq!(parse_header("[!EXAMPLE]- Web Page from <https://example.com/a>"), expected);
        assert_eq!(parse_header("[!EXAMPLE]- Content from \"https://example.com/a\""), expected);
        assert_eq!(parse_header("[!EXAMPLE]- Web Page from <ftp://example.com>"), None);
    }

    #[test]
    fn other_callouts_are_not_annotations() {
        assert_eq!(parse_header("[!BUG]+ **Stream failed**"), None);
        assert_eq!(parse_header("[!NOTE]- Using **10** tokens"), None);
        assert_eq!(parse_header("just a quote"), None);
    }

    #[test]
    fn header_round_trips_through_parser() {
        for (kind, reference) in [
            (AnnotationKind::Transcript, "memo.m4a"),
            (AnnotationKind::PdfContent, "paper.pdf"),
            (AnnotationKind::WebContent, "https://example.org"),
        ] {
            assert_eq!(parse_header(&header(kind, reference)), Some((kind, reference.to_string())));
        }
    }

    #[test]
    fn payload_is_joined_and_trimmed() {
        let a = parse_annotation(&group(&["[!QUOTE]- Transcript from \"m.mp3\"", "", "line one", "", "line two", ""]))
            .unwrap();
        assert_eq!(a.payload, "line one\n\nline two");
    }

    #[test]
    fn transcript_replaces_embed_placeholder() {
        let groups = [group(&["[!QUOTE]- Transcript from \"m.mp3\"", "hello world"])];
        let r = resolve("Listen: ![[m.mp3]]", groups.iter().map(Vec::as_slice), "transcribed and read");
        assert_eq!(r.content, "Listen: \"hello world\" (transcribed and read)");
        assert_eq!(r.transcripts, vec!["m.mp3".to_string()]);
    }

    #[test]
    fn only_first_placeholder_is_replaced() {
        let groups = [group(&["[!QUOTE] Transcript from \"m.mp3\"", "hi"])];
        let r = resolve("![[m.mp3]] and ![[m.mp3]]", groups.iter().map(Vec::as_slice), "read");
        assert_eq!(r.content, "\"hi\" (read) and ![[m.mp3]]");
    }

    #[test]
    fn pdf_replaces_embed_and_plain_link() {
        let groups = [group(&["[!ABSTRACT]- Content from \"p.pdf\"", "<\u{FEFF}b>bold</b>"])];
        let r = resolve("See [[p.pdf]] please", groups.iter().map(Vec::as_slice), "read");
        assert_eq!(r.content, "See \"p.pdf\":\n\"\"\"\n<b>bold</b>\n\"\"\"\n\n please");
        assert!(r.transcripts.is_empty());
    }

    #[test]
    fn web_replaces_angle_link() {
        let groups = [group(&["[!EXAMPLE]- Web Page from <https://x.io>", "Title", "Body"])];
        let r = resolve("Summarise <https://x.io>", groups.iter().map(Vec::as_slice), "read");
        assert_eq!(r.content, "Summarise @\"https://x.io\"\n\"\"\"\nTitle\nBody\n\"\"\"");
    }

    #[test]
    fn annotation_without_placeholder_is_harmless() {
        let groups = [group(&["[!QUOTE]- Transcript from \"gone.mp3\"", "text"])];
        let r = resolve("nothing here", groups.iter().map(Vec::as_slice), "read");
        assert_eq!(r.content, "nothing here");
        assert!(r.transcripts.is_empty());
    }

    #[test]
    fn markup_escaping_targets_tags_only() {
        assert_eq!(escape_markup("<div> a < b </div> <!-- c -->"), "<\u{FEFF}div> a < b <\u{FEFF}/div> <\u{FEFF}!-- c -->");
        assert_eq!(unescape_markup(&escape_markup("<p>x</p>")), "<p>x</p>");
    }
}
