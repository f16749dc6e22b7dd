//! Callout blocks appended to the document.
//!
//! Each builder returns the full text to append, starting with a blank line.

use parley_input::annotation::{self, AnnotationKind};

pub fn missing(message: &str, path: &str) -> String {
    format!("\n\n> [!MISSING]+ **{message}**\n> {path}")
}

/// `[!BUG]` block with the error chain as a single-line JSON dump.
pub fn bug(message: &str, err: &anyhow::Error) -> String {
    let chain: Vec<String> = err.chain().map(|e| e.to_string()).collect();
    let dump = serde_json::json!({ "message": err.to_string(), "chain": chain });
    format!("\n\n> [!BUG]+ **{message}**\n> ```json\n> {dump}\n> ```")
}

pub fn no_content(reference: &str) -> String {
    format!("\n\n> [!ERROR]- No Content from \"{reference}\"\n> No Content Found.")
}

/// Echo of a fresh transcript.  Paragraph breaks keep the text readable.
pub fn transcript(reference: &str, text: &str) -> String {
    let header = annotation::header(AnnotationKind::Transcript, reference);
    format!("\n\n> {header}\n> {}", text.lines().collect::<Vec<_>>().join("\n>\n> "))
}

/// Echo of fetched web text, already markup-escaped.
pub fn web_page(url: &str, escaped: &str) -> String {
    let header = annotation::header(AnnotationKind::WebContent, url);
    format!("\n\n> {header}\n> {}", quote_lines(escaped))
}

/// Echo of text extracted from a PDF, already markup-escaped.
pub fn pdf_content(reference: &str, escaped: &str) -> String {
    let header = annotation::header(AnnotationKind::PdfContent, reference);
    format!("\n\n> {header}\n> {}", quote_lines(escaped))
}

fn quote_lines(text: &str) -> String {
    text.lines().collect::<Vec<_>>().join("\n> ")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use parley_input::{parse_history, ParseOptions};

    use super::*;

    #[test]
    fn missing_names_the_path() {
        assert_eq!(
            missing("Linked File Not Found", "notes/a.md"),
            "\n\n> [!MISSING]+ **Linked File Not Found**\n> notes/a.md"
        );
    }

    #[test]
    fn bug_dumps_error_chain() {
        let err = anyhow::anyhow!("socket closed").context("streaming failed");
        let text = bug("streaming failed", &err);
        assert!(text.starts_with("\n\n> [!BUG]+ **streaming failed**\n> ```json\n> {"));
        assert!(text.contains("socket closed"));
        assert!(text.ends_with("\n> ```"));
    }

    #[test]
    fn transcript_echo_is_read_back_by_the_parser() {
        let doc = format!("Hear ![[m.mp3]]{}", transcript("m.mp3", "Line one.\nLine two."));
        assert!(doc.contains("> Line one.\n>\n> Line two."));
        let msgs = parse_history(&doc, &ParseOptions::default()).messages;
        assert_eq!(msgs[0].content, "Hear \"Line one.\n\nLine two.\" (transcribed and read)");
    }

    #[test]
    fn web_echo_is_read_back_by_the_parser() {
        let doc = format!("Read <https://a.io>{}", web_page("https://a.io", "# Title\nBody"));
        let msgs = parse_history(&doc, &ParseOptions::default()).messages;
        assert_eq!(msgs[0].content, "Read @\"https://a.io\"\n\"\"\"\n# Title\nBody\n\"\"\"");
    }
}
