//! Version index repository.
//!
//! One record holds the version lists of every document. All mutations are
//! read-modify-write cycles over that record; within this process they are
//! serialized by an internal lock, so overlapping appends cannot drop each
//! other. Writers in other processes are not coordinated.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::model::{VersionIndexEntry, VersionIndexRecord};
use crate::repository::{normalize_namespace, INDEX_RECORD};
use crate::storage::{RecordStore, Result};

/// Outcome of reading the index record.
enum Loaded {
    Present(VersionIndexRecord),
    Missing,
    /// Bytes exist but do not decode; kept so they can be set aside.
    Corrupt(Vec<u8>, serde_json::Error),
}

/// Registry mapping each document to its ordered list of version ids.
pub struct VersionIndex {
    store: Arc<dyn RecordStore>,
    key: String,
    max_versions: usize,
    write_lock: Mutex<()>,
}

impl VersionIndex {
    /// Create an index stored at `<namespace>/_index`.
    pub fn new(store: Arc<dyn RecordStore>, namespace: &str, max_versions: usize) -> Self {
        Self {
            store,
            key: format!("{}/{}", normalize_namespace(namespace), INDEX_RECORD),
            max_versions,
            write_lock: Mutex::new(()),
        }
    }

    pub fn max_versions(&self) -> usize {
        self.max_versions
    }

    /// Get the entry for a document.
    ///
    /// Returns `None` if the document was never snapshotted. Unreadable or
    /// corrupt index records also yield `None`: a broken index must never
    /// block taking new snapshots.
    pub async fn get(&self, document_id: &str) -> Option<VersionIndexEntry> {
        self.load_lenient().await.remove(document_id)
    }

    /// Every version id referenced by any document.
    ///
    /// Unlike [`get`](Self::get) this fails on an unreadable or corrupt index,
    /// since callers use the result to decide what is safe to delete.
    pub async fn all_version_ids(&self) -> Result<Vec<String>> {
        let index = match self.load().await? {
            Loaded::Present(index) => index,
            Loaded::Missing => VersionIndexRecord::new(),
            Loaded::Corrupt(_, e) => return Err(e.into()),
        };
        Ok(index
            .into_values()
            .flat_map(|entry| entry.versions)
            .collect())
    }

    /// Register a version for a document.
    ///
    /// Appending an id already present is a no-op apart from refreshing
    /// `last_updated`. If the list grows past the retention cap, the oldest
    /// ids are dropped from the index and returned so the caller can delete
    /// their records.
    pub async fn append(&self, document_id: &str, version_id: &str) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_for_update().await?;

        let entry = index
            .entry(document_id.to_string())
            .or_insert_with(|| VersionIndexEntry::new(document_id, Utc::now()));

        if !entry.versions.iter().any(|v| v == version_id) {
            entry.versions.push(version_id.to_string());
        }
        entry.last_updated = Utc::now();
        let evicted = truncate_oldest(&mut entry.versions, self.max_versions);

        self.save(&index).await?;
        debug!(
            document_id = %document_id,
            version_id = %version_id,
            evicted = evicted.len(),
            "Appended version to index"
        );
        Ok(evicted)
    }

    /// Overwrite a document's version list.
    ///
    /// Returns ids that did not fit under the retention cap.
    pub async fn replace(&self, document_id: &str, version_ids: Vec<String>) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_for_update().await?;

        let entry = index
            .entry(document_id.to_string())
            .or_insert_with(|| VersionIndexEntry::new(document_id, Utc::now()));
        entry.versions = version_ids;
        entry.last_updated = Utc::now();
        let evicted = truncate_oldest(&mut entry.versions, self.max_versions);

        self.save(&index).await?;
        debug!(
            document_id = %document_id,
            versions = index.get(document_id).map_or(0, |e| e.versions.len()),
            "Replaced index entry"
        );
        Ok(evicted)
    }

    /// Drop the given ids from a document's version list.
    ///
    /// Ids registered since the caller last read the entry are kept, so a
    /// prune racing a create cannot lose the new version. Returns any ids that
    /// still exceed the retention cap afterwards.
    pub async fn discard(&self, document_id: &str, version_ids: &[String]) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_for_update().await?;

        let Some(entry) = index.get_mut(document_id) else {
            return Ok(Vec::new());
        };
        entry.versions.retain(|v| !version_ids.contains(v));
        entry.last_updated = Utc::now();
        let evicted = truncate_oldest(&mut entry.versions, self.max_versions);
        let remaining = entry.versions.len();

        self.save(&index).await?;
        debug!(
            document_id = %document_id,
            discarded = version_ids.len(),
            versions = remaining,
            "Discarded versions from index"
        );
        Ok(evicted)
    }

    /// Remove a document's entry.
    ///
    /// Returns `false` if there was none.
    pub async fn remove(&self, document_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load_for_update().await?;

        if index.remove(document_id).is_none() {
            return Ok(false);
        }

        self.save(&index).await?;
        debug!(document_id = %document_id, "Removed index entry");
        Ok(true)
    }

    async fn load(&self) -> Result<Loaded> {
        match self.store.read_record(&self.key).await? {
            None => Ok(Loaded::Missing),
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(index) => Ok(Loaded::Present(index)),
                Err(e) => Ok(Loaded::Corrupt(bytes, e)),
            },
        }
    }

    async fn load_lenient(&self) -> VersionIndexRecord {
        match self.load().await {
            Ok(Loaded::Present(index)) => index,
            Ok(Loaded::Missing) => VersionIndexRecord::new(),
            Ok(Loaded::Corrupt(_, e)) => {
                warn!(key = %self.key, error = %e, "Version index is corrupt, treating as empty");
                VersionIndexRecord::new()
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read version index, treating as empty");
                VersionIndexRecord::new()
            }
        }
    }

    /// Load the index ahead of a write.
    ///
    /// A corrupt record is copied aside and replaced by a fresh index. A read
    /// failure also starts a fresh index so that new snapshots are never
    /// blocked; the next save overwrites whatever could not be read.
    async fn load_for_update(&self) -> Result<VersionIndexRecord> {
        match self.load().await {
            Ok(Loaded::Present(index)) => Ok(index),
            Ok(Loaded::Missing) => Ok(VersionIndexRecord::new()),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read version index, starting a fresh one");
                Ok(VersionIndexRecord::new())
            }
            Ok(Loaded::Corrupt(bytes, _)) => {
                let backup = format!("{}.corrupt-{}", self.key, Utc::now().timestamp_millis());
                warn!(key = %self.key, backup = %backup, "Version index is corrupt, starting a fresh one");
                if let Err(e) = self.store.write_record(&backup, bytes).await {
                    warn!(backup = %backup, error = %e, "Failed to keep copy of corrupt index");
                }
                Ok(VersionIndexRecord::new())
            }
        }
    }

    async fn save(&self, index: &VersionIndexRecord) -> Result<()> {
        let bytes = serde_json::to_vec(index)?;
        self.store.write_record(&self.key, bytes).await
    }
}

/// Drop the oldest entries so at most `max` remain, returning the dropped ones.
fn truncate_oldest(versions: &mut Vec<String>, max: usize) -> Vec<String> {
    if versions.len() <= max {
        return Vec::new();
    }
    let excess = versions.len() - max;
    versions.drain(..excess).collect()
}
