//! Snapshot repository.
//!
//! Durable key/value access to individual version records.

use std::sync::Arc;

use tracing::debug;

use crate::model::VersionSnapshot;
use crate::repository::{normalize_namespace, sanitize_key_segment, INDEX_RECORD};
use crate::storage::{RecordStore, Result};

/// Repository for VersionSnapshot records.
///
/// Records are stored as JSON at `<namespace>/<sanitized id>`. The repository
/// does not check uniqueness: putting an existing id replaces the record.
pub struct SnapshotRepository {
    store: Arc<dyn RecordStore>,
    namespace: String,
}

impl SnapshotRepository {
    /// Create a new snapshot repository under `namespace`.
    pub fn new(store: Arc<dyn RecordStore>, namespace: &str) -> Self {
        Self {
            store,
            namespace: normalize_namespace(namespace),
        }
    }

    /// Record key for a version id.
    pub fn record_key(&self, version_id: &str) -> String {
        format!("{}/{}", self.namespace, sanitize_key_segment(version_id))
    }

    /// Persist a snapshot.
    pub async fn put(&self, snapshot: &VersionSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.store
            .write_record(&self.record_key(&snapshot.id), bytes)
            .await?;
        debug!(version_id = %snapshot.id, "Stored snapshot");
        Ok(())
    }

    /// Retrieve a snapshot.
    ///
    /// Returns `None` if no record exists.
    pub async fn get(&self, version_id: &str) -> Result<Option<VersionSnapshot>> {
        match self.store.read_record(&self.record_key(version_id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete a snapshot.
    ///
    /// Returns `false` if it never existed.
    pub async fn delete(&self, version_id: &str) -> Result<bool> {
        let deleted = self.store.delete_record(&self.record_key(version_id)).await?;
        debug!(version_id = %version_id, deleted, "Deleted snapshot");
        Ok(deleted)
    }

    /// All snapshot record keys in the namespace.
    ///
    /// The index record and set-aside copies of it are excluded.
    pub async fn record_keys(&self) -> Result<Vec<String>> {
        let prefix = format!("{}/", self.namespace);
        let index_key = format!("{}{}", prefix, INDEX_RECORD);
        let index_backup = format!("{}.corrupt-", index_key);
        let keys = self.store.list_keys(&prefix).await?;
        Ok(keys
            .into_iter()
            .filter(|k| {
                *k != index_key && !k.starts_with(&index_backup) && !k[prefix.len()..].contains('/')
            })
            .collect())
    }

    /// Delete a record by key, as returned from [`record_keys`](Self::record_keys).
    pub async fn delete_key(&self, key: &str) -> Result<bool> {
        self.store.delete_record(key).await
    }
}
