// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! File-system capability used by the pipeline.
//!
//! Every read and write of the document, linked files, audio and logs goes
//! through [`Disk`] so the pipeline can run against [`MemoryDisk`] in tests.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait Disk: Send + Sync {
    async fn read_file(&self, path: &Path) -> anyhow::Result<String>;
    async fn read_binary(&self, path: &Path) -> anyhow::Result<Vec<u8>>;
    /// Append `text` to `path`, creating the file if needed.  Each call is
    /// written in one piece.
    async fn append_file(&self, path: &Path, text: &str) -> anyhow::Result<()>;
    async fn delete_file(&self, path: &Path) -> anyhow::Result<()>;
    async fn path_exists(&self, path: &Path) -> bool;
    /// Create `dir` and its parents.
    async fn path_ensure(&self, dir: &Path) -> anyhow::Result<()>;
}

// ─── Local file system ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDisk;

#[async_trait]
impl Disk for LocalDisk {
    async fn read_file(&self, path: &Path) -> anyhow::Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }

    async fn read_binary(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }

    async fn append_file(&self, path: &Path, text: &str) -> anyhow::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("opening {} for append", path.display()))?;
        file.write_all(text.as_bytes())
            .await
            .with_context(|| format!("appending to {}", path.display()))?;
        file.flush().await?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("deleting {}", path.display()))
    }

    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn path_ensure(&self, dir: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))
    }
}

// ─── In-memory ───────────────────────────────────────────────────────────────

/// In-memory disk for tests.  Directories are implicit: a path "exists" when
/// it is a file or a prefix of one, or when it was created with
/// [`Disk::path_ensure`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDisk {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), content.into());
        }
        self
    }

    /// Current text of `path`, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let files = self.files.lock().ok()?;
        files.get(path.as_ref()).map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().map(|f| f.keys().cloned().collect()).unwrap_or_default()
    }

    fn lock_files(&self) -> anyhow::Result<std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>>> {
        self.files.lock().map_err(|_| anyhow!("memory disk poisoned"))
    }
}

#[async_trait]
impl Disk for MemoryDisk {
    async fn read_file(&self, path: &Path) -> anyhow::Result<String> {
        let bytes = self.read_binary(path).await?;
        String::from_utf8(bytes).with_context(|| format!("{} is not UTF-8", path.display()))
    }

    async fn read_binary(&self, path: &Path) -> anyhow::Result<Vec<u8>> {
        self.lock_files()?
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }

    async fn append_file(&self, path: &Path, text: &str) -> anyhow::Result<()> {
        self.lock_files()?
            .entry(path.to_path_buf())
            .or_default()
            .extend_from_slice(text.as_bytes());
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> anyhow::Result<()> {
        self.lock_files()?
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }

    async fn path_exists(&self, path: &Path) -> bool {
        let Ok(files) = self.files.lock() else { return false };
        if files.keys().any(|p| p.starts_with(path)) {
            return true;
        }
        drop(files);
        self.dirs.lock().map(|d| d.iter().any(|p| p.starts_with(path))).unwrap_or(false)
    }

    async fn path_ensure(&self, dir: &Path) -> anyhow::Result<()> {
        self.dirs
            .lock()
            .map_err(|_| anyhow!("memory disk poisoned"))?
            .push(dir.to_path_buf());
        Ok(())
    }
}

// ─── Path utilities ──────────────────────────────────────────────────────────

/// Final component of `path`.
pub fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Lower-cased extension of `path` without the dot; empty when there is none.
pub fn ext_name(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn join_path(base: &Path, rel: &str) -> PathBuf {
    base.join(rel)
}

/// Parent directory of `path`; `.` for a bare file name.
pub fn dir_name(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
