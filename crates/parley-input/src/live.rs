//! Live text: the parts of a message outside code and text fences.
//!
//! Link expansion, transcription and web fetching only look at live text, so
//! a fenced `![[file]]` or `<https://…>` is left alone.  `<% … %>` template
//! spans are inert as well.

use std::ops::Range;

use crate::scanner::{LineKind, Scanner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Consecutive unfenced lines
    Live(String),
    /// Fence delimiters and fenced lines, verbatim
    Fenced(String),
}

/// Split `content` into alternating live and fenced runs.
///
/// Runs are newline-joined; joining every run's text with `\n` restores the
/// input.  The document ends with a live run, possibly empty.
pub fn segments(content: &str) -> Vec<Segment> {
    // Separators do not matter inside a message.
    let mut scanner = Scanner::new("");
    let mut out = Vec::new();
    let mut live: Vec<&str> = Vec::new();

    for line in content.lines() {
        if scanner.classify(line).is_fenced() {
            if !live.is_empty() {
                out.push(Segment::Live(live.join("\n")));
                live.clear();
            }
            out.push(Segment::Fenced(line.to_string()));
        } else {
            live.push(line);
        }
    }
    out.push(Segment::Live(live.join("\n")));
    out
}

/// Rejoin processed runs and trim the result.
pub fn reassemble<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<S> = parts.into_iter().collect();
    let texts: Vec<&str> = parts.iter().map(|p| p.as_ref()).collect();
    texts.join("\n").trim().to_string()
}

/// Apply `f` to every live run of `content`.
pub fn map_live<F>(content: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    reassemble(segments(content).into_iter().map(|s| match s {
        Segment::Live(text) => f(&text),
        Segment::Fenced(text) => text,
    }))
}

/// Byte ranges of `<% … %>` template spans.  An unterminated `<%` runs to
/// the end of the text.
pub fn template_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(open) = text[from..].find("<%") {
        let start = from + open;
        let end = match text[start + 2..].find("%>") {
            Some(close) => start + 2 + close + 2,
            None => text.len(),
        };
        spans.push(start..end);
        from = end;
    }
    spans
}

pub fn in_template(spans: &[Range<usize>], at: usize) -> bool {
    spans.iter().any(|s| s.contains(&at))
}

/// Rewrite `[[target]]` wiki-links into `![[target]]` embeds.
///
/// Links already preceded by `!`, links inside fences and links inside
/// template spans are left untouched.
pub fn promote_wiki_links(content: &str) -> String {
    map_live(content, |text| {
        let spans = template_spans(text);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut from = 0;
        while let Some(open) = text[from..].find("[[") {
            let start = from + open;
            let Some(close) = text[start + 2..].find("]]") else { break };
            let end = start + 2 + close + 2;
            let embedded = text[..start].ends_with('!');
            let has_target = close > 0;
            if !embedded && has_target && !in_template(&spans, start) {
                out.push_str(&text[last..start]);
                out.push('!');
                out.push_str(&text[start..end]);
                last = end;
            }
            from = end;
        }
        out.push_str(&text[last..]);
        out
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
