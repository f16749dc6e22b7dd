// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Document pipeline: enrichment, model streaming, token accounting and logs.

pub mod callouts;
pub mod context;
pub mod disk;
pub mod enrich;
pub mod fetch;
pub mod logs;
pub mod pipeline;
pub mod tokens;

pub use context::{Context, Services};
pub use disk::{Disk, LocalDisk, MemoryDisk};
pub use enrich::{Enriched, Stage};
pub use fetch::{HttpWebFetcher, PdfExtractor, StubWebFetcher, WebFetcher, WebPage};
pub use logs::LoggedSettings;
pub use pipeline::{ChatOutcome, Pipeline};
pub use tokens::{Severity, TiktokenTokenizer, TokenReport, Tokenizer, WordTokenizer};
