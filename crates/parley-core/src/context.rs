//! Loading a document together with its preset config documents.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use parley_config::{Config, ConfigLayer};
use parley_input::{
    live, load_content, parse_document, parse_history, FrontMatter, LoadedContent, ParseOptions,
};
use parley_model::{ChatMessage, ModelProvider, Transcriber};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    callouts,
    disk::{dir_name, Disk, LocalDisk},
    fetch::{HttpWebFetcher, PdfExtractor, WebFetcher},
    tokens::Tokenizer,
};

// ── Services ──────────────────────────────────────────────────────────────────

/// Collaborators used by the pipeline.
///
/// `provider`, `transcriber` and `tokenizer` are built from the resolved
/// config of each document when left unset.
#[derive(Clone)]
pub struct Services {
    pub disk: Arc<dyn Disk>,
    pub provider: Option<Arc<dyn ModelProvider>>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub fetcher: Arc<dyn WebFetcher>,
    pub pdf: Option<Arc<dyn PdfExtractor>>,
    pub tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl Services {
    pub fn new(disk: Arc<dyn Disk>, fetcher: Arc<dyn WebFetcher>) -> Self {
        Self { disk, provider: None, transcriber: None, fetcher, pdf: None, tokenizer: None }
    }

    /// Local file system and live HTTP.
    pub fn local() -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(LocalDisk), Arc::new(HttpWebFetcher::new()?)))
    }

    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_pdf_extractor(mut self, pdf: Arc<dyn PdfExtractor>) -> Self {
        self.pdf = Some(pdf);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// A parsed document and everything resolved for it.
#[derive(Debug, Clone)]
pub struct Context {
    pub path: PathBuf,
    /// Directory linked files are resolved against
    pub doc_dir: PathBuf,
    pub config: Config,
    pub opts: ParseOptions,
    /// Document body without front-matter
    pub body: String,
    /// Non-config front-matter keys, the document's own winning over the
    /// config document's
    pub metadata: Map<String, Value>,
    /// Config-document history followed by the document's history
    pub history: Vec<ChatMessage>,
    pub prompt: String,
    pub prompt_label: String,
    /// Transcripts whose annotation replaced an audio placeholder
    pub transcripts: Vec<String>,
    /// Callouts raised while loading
    pub notices: Vec<String>,
}

/// A preset config document.
struct Preset {
    front_matter: FrontMatter,
    body: String,
}

impl Context {
    /// Read and parse `path`.
    ///
    /// Precedence, lowest first: `base`, the config document named by
    /// `model.config`, the document's front-matter, `overrides`.  A missing
    /// document is an error; missing config documents only add a notice.
    pub async fn load(
        disk: &dyn Disk,
        path: &Path,
        base: &Config,
        overrides: &ConfigLayer,
    ) -> anyhow::Result<Self> {
        let content = disk
            .read_file(path)
            .await
            .with_context(|| format!("loading document {}", path.display()))?;
        let (front_matter, body) = parse_document(&content)
            .with_context(|| format!("parsing front-matter of {}", path.display()))?;

        let mut notices = Vec::new();
        let probe = base.clone().layered([&front_matter.layer, overrides]);
        let preset = match &probe.model.config {
            Some(name) => {
                load_preset(disk, &probe, name, "Config File Not Found", &mut notices).await?
            }
            None => None,
        };

        let empty = ConfigLayer::default();
        let preset_layer = preset.as_ref().map(|p| &p.front_matter.layer).unwrap_or(&empty);
        let mut config = base.clone().layered([preset_layer, &front_matter.layer, overrides]);

        if let Some(name) = config.whisper.config.clone() {
            if let Some(whisper) =
                load_preset(disk, &config, &name, "Whisper File Not Found", &mut notices).await?
            {
                let layer = ConfigLayer {
                    whisper: whisper.front_matter.layer.whisper,
                    ..Default::default()
                };
                config.apply(&layer);
                let input = whisper.body.trim();
                if !input.is_empty() {
                    config.whisper.input = Some(input.to_string());
                }
            }
        }

        let opts = ParseOptions::from_config(&config);
        let LoadedContent { history, prompt, prompt_label, transcripts } = load_content(body, &opts);

        let mut metadata = Map::new();
        let mut full_history = Vec::new();
        if let Some(preset) = preset {
            let system_opts = opts.clone().with_user_label("System");
            full_history.extend(parse_history(&preset.body, &system_opts).messages.into_iter().map(
                |mut m| {
                    m.content = live::promote_wiki_links(&m.content);
                    m
                },
            ));
            metadata.extend(preset.front_matter.metadata);
        }
        full_history.extend(history);
        metadata.extend(front_matter.metadata);

        info!(
            path = %path.display(),
            model = %config.model.name,
            history = full_history.len(),
            prompt_chars = prompt.len(),
            "document loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            doc_dir: dir_name(path),
            body: body.to_string(),
            config,
            opts,
            metadata,
            history: full_history,
            prompt,
            prompt_label,
            transcripts,
            notices,
        })
    }

    /// `{meta_prompt} `{json}`` system message, when there is metadata.
    pub fn meta_message(&self) -> anyhow::Result<Option<ChatMessage>> {
        if self.metadata.is_empty() {
            return Ok(None);
        }
        let json = serde_json::to_string(&self.metadata).context("serializing metadata")?;
        Ok(Some(ChatMessage::system(format!("{} `{}`", self.config.prompts.meta, json))))
    }

    /// File stem of the document, used to name its chat log.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// `{data}/configs/{name}`, with `.md` added when missing.
pub fn preset_path(config: &Config, name: &str) -> PathBuf {
    let file = if name.ends_with(".md") { name.to_string() } else { format!("{name}.md") };
    config.paths.configs_dir().join(file)
}

async fn load_preset(
    disk: &dyn Disk,
    config: &Config,
    name: &str,
    missing: &str,
    notices: &mut Vec<String>,
) -> anyhow::Result<Option<Preset>> {
    let path = preset_path(config, name);
    if !disk.path_exists(&path).await {
        notices.push(callouts::missing(missing, &path.display().to_string()));
        return Ok(None);
    }
    let content = disk.read_file(&path).await?;
    let (front_matter, body) = parse_document(&content)
        .with_context(|| format!("parsing front-matter of {}", path.display()))?;
    debug!(path = %path.display(), "loaded config document");
    Ok(Some(Preset { front_matter, body: body.to_string() }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use parley_model::Role;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::disk::MemoryDisk;

    fn base() -> Config {
        let mut cfg = Config::default();
        cfg.paths.data_dir = Some("/data".into());
        cfg
    }

    async fn load(disk: &MemoryDisk) -> Context {
        Context::load(disk, Path::new("/vault/doc.md"), &base(), &ConfigLayer::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_document_is_fatal() {
        let disk = MemoryDisk::new();
        let err = Context::load(&disk, Path::new("/nope.md"), &base(), &ConfigLayer::default())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("/nope.md"));
    }

    #[tokio::test]
    async fn front_matter_overrides_and_metadata() {
        let doc = "---\nmodel:\n  label: Gladdis\nproject: apollo\n---\nHello";
        let disk = MemoryDisk::new().with_file("/vault/doc.md", doc);
        let ctx = load(&disk).await;
        assert_eq!(ctx.config.model.label, "Gladdis");
        assert_eq!(ctx.metadata.get("project"), Some(&Value::from("apollo")));
        assert_eq!(ctx.prompt, "Hello");
        assert_eq!(ctx.prompt_label, "User");
        assert!(ctx.history.is_empty());
        assert_eq!(ctx.doc_dir, PathBuf::from("/vault"));
        assert_eq!(ctx.stem(), "doc");
    }

    #[tokio::test]
    async fn cli_overrides_win_over_front_matter() {
        let doc = "---\nmodel:\n  name: gpt-4\n---\nHi";
        let disk = MemoryDisk::new().with_file("/vault/doc.md", doc);
        let mut overrides = ConfigLayer::default();
        overrides.model.name = Some("gpt-4o".into());
        let ctx = Context::load(&disk, Path::new("/vault/doc.md"), &base(), &overrides).await.unwrap();
        assert_eq!(ctx.config.model.name, "gpt-4o");
    }

    #[tokio::test]
    async fn config_document_is_layered_and_prepended() {
        let preset = "---\nmodel:\n  label: Tutor\n  temperature: 0.2\nsubject: math\n---\nYou teach [[algebra]].";
        let doc = "---\nmodel:\n  config: tutor\n  temperature: 0.9\n---\nWhat is x?";
        let disk = MemoryDisk::new()
            .with_file("/data/configs/tutor.md", preset)
            .with_file("/vault/doc.md", doc);
        let ctx = load(&disk).await;

        assert_eq!(ctx.config.model.label, "Tutor");
        assert_eq!(ctx.config.model.temperature, 0.9);
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.history[0].role, Role::System);
        assert_eq!(ctx.history[0].content, "You teach ![[algebra]].");
        assert_eq!(ctx.metadata.get("subject"), Some(&Value::from("math")));
        assert!(ctx.notices.is_empty());
    }

    #[tokio::test]
    async fn missing_config_document_is_a_notice() {
        let doc = "---\nmodel:\n  config: ghost\n---\nHi";
        let disk = MemoryDisk::new().with_file("/vault/doc.md", doc);
        let ctx = load(&disk).await;
        assert_eq!(ctx.notices, vec![callouts::missing("Config File Not Found", "/data/configs/ghost.md")]);
        assert_eq!(ctx.prompt, "Hi");
    }

    #[tokio::test]
    async fn whisper_document_sets_transcription_prompt() {
        let whisper = "---\nwhisper:\n  language: sv\n---\nNames: Gladdis, Obsidian.\n";
        let doc = "---\nwhisper:\n  config: names\n---\nHi";
        let disk = MemoryDisk::new()
            .with_file("/data/configs/names.md", whisper)
            .with_file("/vault/doc.md", doc);
        let ctx = load(&disk).await;
        assert_eq!(ctx.config.whisper.input.as_deref(), Some("Names: Gladdis, Obsidian."));
        assert_eq!(ctx.config.whisper.language.as_deref(), Some("sv"));
    }

    #[tokio::test]
    async fn meta_message_renders_json() {
        let doc = "---\ntags: [a]\n---\nHi";
        let disk = MemoryDisk::new().with_file("/vault/doc.md", doc);
        let ctx = load(&disk).await;
        let meta = ctx.meta_message().unwrap().unwrap();
        assert_eq!(meta.content, "**Metadata** (as JSON): `{\"tags\":[\"a\"]}`");
        assert!(Context { metadata: Map::new(), ..ctx }.meta_message().unwrap().is_none());
    }
}
