//! Filesystem RecordStore.
//!
//! Each key maps to one file: `versions/doc-1-1700000000000` is stored at
//! `<root>/versions/doc-1-1700000000000.json`. Writes land in a hidden temp
//! file next to the target and are renamed over it, so readers never observe
//! a partially written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::storage::{RecordStore, Result, StorageError};

const RECORD_EXTENSION: &str = "json";

/// Directory-backed record store.
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened filesystem record store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its file path, rejecting keys that would escape the root.
    fn record_path(&self, key: &str) -> Result<PathBuf> {
        let segments = key_segments(key)?;
        let (file, dirs) = segments
            .split_last()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;

        let mut path = self.root.clone();
        for dir in dirs {
            path.push(dir);
        }
        path.push(format!("{}.{}", file, RECORD_EXTENSION));
        Ok(path)
    }

    /// Directory to start a prefix scan from.
    fn scan_root(&self, prefix: &str) -> PathBuf {
        let mut dir = self.root.clone();
        if let Some((dirs, _)) = prefix.rsplit_once('/') {
            for segment in dirs.split('/').filter(|s| !s.is_empty() && *s != "." && *s != "..") {
                dir.push(segment);
            }
        }
        dir
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let stem = relative.with_extension("");
        let parts: Vec<&str> = stem
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

fn key_segments(key: &str) -> Result<Vec<&str>> {
    if key.is_empty() || key.starts_with('/') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    let segments: Vec<&str> = key.split('/').collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\') || s.starts_with('.'))
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn read_record(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.record_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.record_path(key)?;
        let dir = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(dir).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        let temp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        fs::write(&temp, &bytes).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(key = %key, bytes = bytes.len(), "Wrote record to filesystem");
        Ok(())
    }

    async fn delete_record(&self, key: &str) -> Result<bool> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.scan_root(prefix)];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if hidden {
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION) {
                    if let Some(key) = self.key_for(&path) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
