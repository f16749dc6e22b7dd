//! End-to-end runs of the document pipeline against an in-memory disk and
//! scripted collaborators.

use std::{path::Path, sync::Arc};

use parley_config::{Config, ConfigLayer};
use parley_core::{
    callouts, MemoryDisk, Pipeline, Services, Severity, StubWebFetcher, WordTokenizer,
};
use parley_model::{MockTranscriber, Role, ScriptedMockProvider};
use pretty_assertions::assert_eq;

const DOC: &str = "/vault/chat.md";

fn base() -> Config {
    let mut cfg = Config::default();
    cfg.paths.data_dir = Some("/data".into());
    cfg.model.context_window = Some(1000);
    cfg
}

struct Harness {
    disk: MemoryDisk,
    provider: Arc<ScriptedMockProvider>,
    transcriber: Arc<MockTranscriber>,
    pipeline: Pipeline,
}

fn harness(disk: MemoryDisk, provider: ScriptedMockProvider) -> Harness {
    let provider = Arc::new(provider);
    let transcriber = Arc::new(MockTranscriber::replying("spoken words"));
    let fetcher = StubWebFetcher::new().with_page("https://a.io", Some("A"), "page body");
    let services = Services::new(Arc::new(disk.clone()), Arc::new(fetcher))
        .with_provider(provider.clone())
        .with_transcriber(transcriber.clone())
        .with_tokenizer(Arc::new(WordTokenizer));
    let pipeline = Pipeline::new(services, base(), ConfigLayer::default());
    Harness { disk, provider, transcriber, pipeline }
}

fn doc(h: &Harness) -> String {
    h.disk.contents(DOC).unwrap()
}

// ── chat ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_appends_reply_report_and_next_turn() {
    let h = harness(
        MemoryDisk::new().with_file(DOC, "Hello there"),
        ScriptedMockProvider::streaming(&["Hi", " there!"]),
    );
    let outcome = h.pipeline.chat(Path::new(DOC)).await.unwrap();

    assert_eq!(outcome.reply, "Hi there!");
    let text = doc(&h);
    assert!(text.starts_with("Hello there\n\n__Parley:__ Hi there!\n\n> [!NOTE]- [**"));
    assert!(text.ends_with("\n\n---\n\n__User:__ "));

    let sent = h.provider.last_messages().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].role, Role::System);
    assert_eq!(sent[1].content, "Hello there");
    assert_eq!(sent[1].name, None);

    let call_log = h.disk.contents(outcome.call_log.unwrap()).unwrap();
    assert!(call_log.contains("__Parley:__ Hi there!"));
    let chat_log = h.disk.contents(outcome.chat_log.unwrap()).unwrap();
    assert!(chat_log.contains("__User:__ Hello there"));
}

#[tokio::test]
async fn chat_keeps_speaker_and_sends_metadata() {
    let text = "---\nproject: apollo\n---\n__Ada:__ First\n---\n__Parley:__ Reply\n---\nSecond";
    let h = harness(MemoryDisk::new().with_file(DOC, text), ScriptedMockProvider::always_text("Ok"));
    h.pipeline.chat(Path::new(DOC)).await.unwrap();

    let sent = h.provider.last_messages().unwrap();
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[1].content, "**Metadata** (as JSON): `{\"project\":\"apollo\"}`");
    assert_eq!(sent[4].name.as_deref(), Some("Ada"));
    assert_eq!(sent[4].content, "Second");
    assert!(doc(&h).ends_with("__Ada:__ "));
}

#[tokio::test]
async fn chat_enriches_prompt_before_sending() {
    let disk = MemoryDisk::new()
        .with_file(DOC, "Read ![[notes.md]] and <https://a.io>")
        .with_file("/vault/notes.md", "remember milk");
    let h = harness(disk, ScriptedMockProvider::always_text("Done"));
    h.pipeline.chat(Path::new(DOC)).await.unwrap();

    let sent = h.provider.last_messages().unwrap();
    let prompt = &sent[1].content;
    assert!(prompt.contains("notes.md:\n\n```md\nremember milk\n```"));
    assert!(prompt.contains("@\"https://a.io\"\n\"\"\"\n# A\n\npage body\n\"\"\""));
    assert!(doc(&h).contains(&callouts::web_page("https://a.io", "# A\n\npage body")));
}

#[tokio::test]
async fn chat_history_gets_links_but_no_transcription() {
    let disk = MemoryDisk::new()
        .with_file(DOC, "Old ![[memo.mp3]] ![[a.md]]\n---\n__Parley:__ Sure\n---\nNew")
        .with_file("/vault/memo.mp3", vec![0u8])
        .with_file("/vault/a.md", "A");
    let h = harness(disk, ScriptedMockProvider::always_text("Ok"));
    h.pipeline.chat(Path::new(DOC)).await.unwrap();

    let sent = h.provider.last_messages().unwrap();
    assert_eq!(sent[1].content, "Old ![[memo.mp3]] a.md:\n\n```md\nA\n```");
    assert_eq!(h.transcriber.request_count(), 0);
}

#[tokio::test]
async fn streaming_failure_keeps_partial_output() {
    let h = harness(
        MemoryDisk::new().with_file(DOC, "Question"),
        ScriptedMockProvider::failing_after(&["Par", "tial"], "connection reset"),
    );
    let outcome = h.pipeline.chat(Path::new(DOC)).await.unwrap();

    assert_eq!(outcome.reply, "Partial");
    let text = doc(&h);
    assert!(text.contains("__Parley:__ Partial\n\n> [!BUG]+ **connection reset**"));
    assert!(text.contains("tokens out of **1,000** max tokens."));
    assert!(text.ends_with("__User:__ "));
}

#[tokio::test]
async fn refused_request_is_reported_without_reply_header() {
    let h = harness(
        MemoryDisk::new().with_file(DOC, "Question"),
        ScriptedMockProvider::refusing("invalid api key"),
    );
    let outcome = h.pipeline.chat(Path::new(DOC)).await.unwrap();

    assert_eq!(outcome.reply, "");
    let text = doc(&h);
    assert!(text.starts_with("Question\n\n> [!BUG]+ **invalid api key**"));
    assert!(!text.contains("__Parley:__"));
}

#[tokio::test]
async fn missing_document_fails_without_writing() {
    let h = harness(MemoryDisk::new(), ScriptedMockProvider::always_text("x"));
    assert!(h.pipeline.chat(Path::new(DOC)).await.is_err());
    assert!(h.disk.paths().is_empty());
}

#[tokio::test]
async fn config_document_feeds_system_history() {
    let disk = MemoryDisk::new()
        .with_file("/data/configs/tutor.md", "---\nmodel:\n  label: Tutor\n---\nYou teach.")
        .with_file(DOC, "---\nmodel:\n  config: tutor\n---\nWhat is x?");
    let h = harness(disk, ScriptedMockProvider::always_text("A variable."));
    h.pipeline.chat(Path::new(DOC)).await.unwrap();

    let sent = h.provider.last_messages().unwrap();
    assert_eq!(sent[1].role, Role::System);
    assert_eq!(sent[1].content, "You teach.");
    assert!(doc(&h).contains("\n\n__Tutor:__ A variable."));
}

#[tokio::test]
async fn missing_config_document_is_noted_and_chat_continues() {
    let h = harness(
        MemoryDisk::new().with_file(DOC, "---\nmodel:\n  config: ghost\n---\nHi"),
        ScriptedMockProvider::always_text("Hello"),
    );
    h.pipeline.chat(Path::new(DOC)).await.unwrap();
    let text = doc(&h);
    assert!(text.contains(&callouts::missing("Config File Not Found", "/data/configs/ghost.md")));
    assert!(text.contains("__Parley:__ Hello"));
}

#[tokio::test]
async fn consumed_transcripts_are_deleted_when_configured() {
    let text = "---\nwhisper:\n  delete_file: true\n---\nListen ![[m.mp3]]\n\n> [!QUOTE]- Transcript from \"m.mp3\"\n> words";
    let disk = MemoryDisk::new().with_file(DOC, text).with_file("/vault/m.mp3", vec![1u8]);
    let h = harness(disk, ScriptedMockProvider::always_text("Heard"));
    h.pipeline.chat(Path::new(DOC)).await.unwrap();

    let sent = h.provider.last_messages().unwrap();
    assert_eq!(sent[1].content, "Listen \"words\" (transcribed and read)");
    assert!(h.disk.contents("/vault/m.mp3").is_none());
    assert_eq!(h.transcriber.request_count(), 0);
}

// ── process / prompt / tokens ─────────────────────────────────────────────────

#[tokio::test]
async fn process_transcribes_everything_but_echoes_only_the_prompt() {
    let disk = MemoryDisk::new()
        .with_file(DOC, "Old ![[a.mp3]]\n---\n__Parley:__ Ok\n---\nNew ![[b.mp3]]")
        .with_file("/vault/a.mp3", vec![0u8])
        .with_file("/vault/b.mp3", vec![0u8]);
    let h = harness(disk, ScriptedMockProvider::always_text("unused"));
    let report = h.pipeline.process(Path::new(DOC)).await.unwrap();

    assert_eq!(h.transcriber.request_count(), 2);
    let text = doc(&h);
    assert!(!text.contains("Transcript from \"a.mp3\""));
    assert!(text.contains(&callouts::transcript("b.mp3", "spoken words")));
    assert!(text.ends_with(&report.callout()));
    assert!(h.provider.last_messages().is_none());
    assert_eq!(report.system, 0);
}

#[tokio::test]
async fn prompt_only_looks_after_the_last_separator() {
    let disk = MemoryDisk::new()
        .with_file(DOC, "Old ![[ghost.md]]\n---\nNew ![[a.md]]")
        .with_file("/vault/a.md", "A");
    let h = harness(disk, ScriptedMockProvider::always_text("unused"));
    let report = h.pipeline.prompt(Path::new(DOC)).await.unwrap();

    let text = doc(&h);
    assert!(!text.contains("Linked File Not Found"));
    assert!(text.ends_with(&report.callout()));
    assert!(report.prompt > 0);
    assert_eq!(report.conversation, 0);
}

#[tokio::test]
async fn tokens_reports_without_touching_the_document() {
    let original = "__System:__ Be brief.\n---\nWhat is Rust?";
    let h = harness(MemoryDisk::new().with_file(DOC, original), ScriptedMockProvider::always_text("x"));
    let report = h.pipeline.tokens(Path::new(DOC)).await.unwrap();

    assert_eq!(doc(&h), original);
    // "user\nWhat is Rust?" = 4 words + 3
    assert_eq!(report.prompt, 7);
    assert!(report.system > 0);
    assert_eq!(report.conversation, 0);
    assert_eq!(report.severity(), Severity::Note);
}
