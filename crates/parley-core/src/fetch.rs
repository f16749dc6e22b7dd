//! Collaborators that pull content from outside the document: web pages and
//! PDF text.

use std::collections::HashMap;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tracing::debug;

/// Readable text of a web page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebPage {
    pub title: Option<String>,
    pub text: String,
}

impl WebPage {
    /// Page text headed by `# {title}` when a title is known.
    pub fn to_markdown(&self) -> String {
        let text = self.text.trim();
        match self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) if !text.is_empty() => format!("# {title}\n\n{text}"),
            _ => text.to_string(),
        }
    }
}

#[async_trait]
pub trait WebFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<WebPage>;
}

/// Fetches pages over HTTP and renders HTML to text.
pub struct HttpWebFetcher {
    client: reqwest::Client,
}

impl HttpWebFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(3))
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebFetcher for HttpWebFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<WebPage> {
        debug!(url = %url, "fetching web page");
        let response = self.client.get(url).send().await.with_context(|| format!("fetching {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("{url} returned {status}");
        }
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let body = response.text().await.with_context(|| format!("reading body of {url}"))?;

        if content_type.contains("html") || content_type.is_empty() {
            Ok(WebPage { title: html_title(&body), text: html_to_text(&body) })
        } else {
            Ok(WebPage { title: None, text: body })
        }
    }
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 100)
}

/// Text of the first `<title>` element.
pub fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    let title = html[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Canned pages for tests.  Unknown URLs fail.
#[derive(Debug, Clone, Default)]
pub struct StubWebFetcher {
    pages: HashMap<String, WebPage>,
}

impl StubWebFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, title: Option<&str>, text: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            WebPage { title: title.map(str::to_string), text: text.to_string() },
        );
        self
    }
}

#[async_trait]
impl WebFetcher for StubWebFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<WebPage> {
        match self.pages.get(url) {
            Some(page) => Ok(page.clone()),
            None => bail!("no route to {url}"),
        }
    }
}

/// Extracts plain text from PDF bytes.
#[async_trait]
pub trait PdfExtractor: Send + Sync {
    async fn extract(&self, pdf: &[u8]) -> anyhow::Result<String>;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_extracted_and_collapsed() {
        let html = "<html><head><TITLE lang=\"en\">  Hello\n  World </TITLE></head><body>x</body></html>";
        assert_eq!(html_title(html).as_deref(), Some("Hello World"));
        assert_eq!(html_title("<p>none</p>"), None);
        assert_eq!(html_title("<title></title>"), None);
    }

    #[test]
    fn html_to_text_strips_tags() {
        let text = html_to_text("<html><body><h1>Hello</h1><p>World</p></body></html>");
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn markdown_prefixes_title() {
        let page = WebPage { title: Some("T".into()), text: "body\n".into() };
        assert_eq!(page.to_markdown(), "# T\n\nbody");
        let empty = WebPage { title: Some("T".into()), text: "  ".into() };
        assert_eq!(empty.to_markdown(), "");
    }

    #[tokio::test]
    async fn stub_fetcher_serves_known_pages_only() {
        let f = StubWebFetcher::new().with_page("https://a.io", None, "hi");
        assert_eq!(f.fetch("https://a.io").await.unwrap().text, "hi");
        assert!(f.fetch("https://b.io").await.is_err());
    }
}
