//! Version history coordinator.
//!
//! The only component callers should use directly. It sequences the snapshot
//! repository and the version index so that whole operations keep their
//! guarantees: bounded retention, newest-first listings and restores that
//! never lose the state they replace.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{Config, RetentionConfig};
use crate::model::{DocumentState, VersionDiff, VersionSnapshot};
use crate::repository::{SnapshotRepository, VersionIndex};
use crate::services::diff::compare_versions;
use crate::storage::{init_storage, RecordStore, StorageError};
use crate::utils::VersionClock;

/// Result type for version history operations.
pub type Result<T> = std::result::Result<T, VersionError>;

/// Errors surfaced by [`VersionHistory`].
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("Version not found: {0}")]
    VersionNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Access to live documents, provided by the editing layer.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load the current state of a document.
    ///
    /// Returns `None` if the document does not exist.
    async fn load_document(
        &self,
        document_id: &str,
    ) -> std::result::Result<Option<DocumentState>, StorageError>;
}

/// Result of pruning one document's history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Versions left in the index.
    pub kept: usize,
    /// Versions whose records were deleted.
    pub removed: Vec<String>,
    /// Versions dropped from the index whose records could not be deleted.
    pub failed: Vec<String>,
}

/// Creates, lists, restores and prunes document versions.
pub struct VersionHistory {
    snapshots: SnapshotRepository,
    index: VersionIndex,
    documents: Arc<dyn DocumentSource>,
    clock: VersionClock,
    prune_probability: f64,
}

impl VersionHistory {
    pub fn new(
        records: Arc<dyn RecordStore>,
        documents: Arc<dyn DocumentSource>,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            snapshots: SnapshotRepository::new(records.clone(), &config.namespace),
            index: VersionIndex::new(records, &config.namespace, config.max_versions.max(1)),
            documents,
            clock: VersionClock::new(),
            prune_probability: config.prune_probability.clamp(0.0, 1.0),
        }
    }

    /// Open the configured record store and build a history on top of it.
    pub async fn from_config(config: &Config, documents: Arc<dyn DocumentSource>) -> Result<Self> {
        let records = init_storage(&config.storage).await?;
        Ok(Self::new(records, documents, &config.retention))
    }

    pub fn max_versions(&self) -> usize {
        self.index.max_versions()
    }

    pub fn snapshots(&self) -> &SnapshotRepository {
        &self.snapshots
    }

    pub fn index(&self) -> &VersionIndex {
        &self.index
    }

    /// Capture `state` as a new version of `document_id`.
    ///
    /// Snapshots unconditionally: deciding whether an edit is worth a version
    /// is up to the caller (see [`content_changed`](crate::services::content_changed)).
    /// The record is written before it is registered in the index, so a
    /// failure in between leaves an unreachable record, never a dangling id.
    #[tracing::instrument(name = "versions.create", skip_all, fields(document_id = %document_id))]
    pub async fn create_snapshot(
        &self,
        document_id: &str,
        state: &DocumentState,
    ) -> Result<VersionSnapshot> {
        let snapshot = VersionSnapshot::capture(document_id, state, self.clock.next());
        self.snapshots.put(&snapshot).await?;

        let evicted = self.index.append(document_id, &snapshot.id).await?;
        if !evicted.is_empty() {
            self.delete_snapshots(&evicted).await;
        }

        info!(
            version_id = %snapshot.id,
            content_length = snapshot.metadata.content_length,
            block_count = snapshot.metadata.block_count,
            evicted = evicted.len(),
            "Created snapshot"
        );

        if self.should_prune() {
            if let Err(e) = self.prune_old_versions(document_id).await {
                warn!(error = %e, "Opportunistic prune failed");
            }
        }

        Ok(snapshot)
    }

    /// All resolvable versions of a document, newest first.
    ///
    /// Ids whose records are missing or unreadable are skipped. A document
    /// without history yields an empty list.
    pub async fn list_versions(&self, document_id: &str) -> Vec<VersionSnapshot> {
        let Some(entry) = self.index.get(document_id).await else {
            return Vec::new();
        };

        let mut versions = self.resolve(&entry.versions).await;
        sort_newest_first(&mut versions);
        versions
    }

    /// Load one version by id.
    pub async fn get_version(&self, version_id: &str) -> Result<Option<VersionSnapshot>> {
        Ok(self.snapshots.get(version_id).await?)
    }

    /// Roll `document_id` back to `version_id`.
    ///
    /// The current live state is snapshotted first; only once that safety
    /// snapshot is committed is the restored state built. The engine never
    /// writes the live document: persisting the returned state is the
    /// caller's job. Fields that are not versioned carry over from the
    /// current document.
    #[tracing::instrument(
        name = "versions.restore",
        skip_all,
        fields(document_id = %document_id, version_id = %version_id)
    )]
    pub async fn restore_version(
        &self,
        document_id: &str,
        version_id: &str,
    ) -> Result<DocumentState> {
        let target = self
            .snapshots
            .get(version_id)
            .await?
            .ok_or_else(|| VersionError::VersionNotFound(version_id.to_string()))?;

        if target.document_id != document_id {
            warn!(
                owner = %target.document_id,
                "Restoring a version captured for another document"
            );
        }

        let current = self
            .documents
            .load_document(document_id)
            .await?
            .ok_or_else(|| VersionError::DocumentNotFound(document_id.to_string()))?;

        let safety = self.create_snapshot(document_id, &current).await?;

        let restored = DocumentState {
            title: Some(target.title),
            content: target.content,
            tags: target.tags,
            emoji: target.emoji,
            updated_at: Some(Utc::now()),
            ..current
        };

        info!(safety_version_id = %safety.id, "Restored version");
        Ok(restored)
    }

    /// Compare two stored versions.
    ///
    /// Returns `None` if either version is missing.
    pub async fn compare_version_ids(
        &self,
        version1: &str,
        version2: &str,
    ) -> Result<Option<VersionDiff>> {
        let (a, b) = futures::try_join!(self.snapshots.get(version1), self.snapshots.get(version2))?;
        Ok(compare_versions(a.as_ref(), b.as_ref()))
    }

    /// Drop the oldest versions until at most `max_versions` remain.
    ///
    /// Individual delete failures are logged and reported in the outcome but
    /// do not abort the batch. The pruned ids are then dropped from the index,
    /// together with ids whose records were already gone. Versions created
    /// while the prune runs stay indexed.
    #[tracing::instrument(name = "versions.prune", skip_all, fields(document_id = %document_id))]
    pub async fn prune_old_versions(&self, document_id: &str) -> Result<PruneOutcome> {
        let listed = self
            .index
            .get(document_id)
            .await
            .map(|entry| entry.versions)
            .unwrap_or_default();
        let mut versions = self.resolve(&listed).await;
        let max = self.index.max_versions();

        if versions.len() <= max {
            debug!(versions = versions.len(), "Nothing to prune");
            return Ok(PruneOutcome {
                kept: versions.len(),
                ..PruneOutcome::default()
            });
        }

        sort_newest_first(&mut versions);
        let oldest: Vec<String> = versions
            .split_off(max)
            .into_iter()
            .rev()
            .map(|v| v.id)
            .collect();
        let survivors: HashSet<&str> = versions.iter().map(|v| v.id.as_str()).collect();
        let dangling = listed
            .iter()
            .filter(|id| !survivors.contains(id.as_str()) && !oldest.contains(id));

        let mut dropped = oldest.clone();
        dropped.extend(dangling.cloned());

        let (mut removed, mut failed) = self.delete_snapshots(&oldest).await;
        let evicted = self.index.discard(document_id, &dropped).await?;
        if !evicted.is_empty() {
            let (more_removed, more_failed) = self.delete_snapshots(&evicted).await;
            removed.extend(more_removed);
            failed.extend(more_failed);
        }

        info!(
            kept = max,
            removed = removed.len(),
            failed = failed.len(),
            "Pruned versions"
        );
        Ok(PruneOutcome {
            kept: max,
            removed,
            failed,
        })
    }

    /// Delete every version of a document and its index entry.
    ///
    /// Used when the document itself is permanently deleted. Every id the
    /// index lists is deleted, including dangling ones. Returns the number of
    /// records actually removed.
    #[tracing::instrument(name = "versions.delete_all", skip_all, fields(document_id = %document_id))]
    pub async fn delete_all_versions(&self, document_id: &str) -> Result<usize> {
        let ids = self
            .index
            .get(document_id)
            .await
            .map(|entry| entry.versions)
            .unwrap_or_default();

        let (removed, failed) = self.delete_snapshots(&ids).await;
        self.index.remove(document_id).await?;

        info!(
            removed = removed.len(),
            failed = failed.len(),
            "Deleted all versions"
        );
        Ok(removed.len())
    }

    /// Record keys under the namespace that no index entry references.
    ///
    /// These are written-but-unregistered snapshots left behind by an
    /// interrupted create, or records whose delete failed during pruning.
    /// Fails if the index cannot be read, rather than reporting every record
    /// as orphaned. Results are only meaningful while no snapshot is being
    /// created.
    pub async fn orphaned_versions(&self) -> Result<Vec<String>> {
        let referenced: HashSet<String> = self
            .index
            .all_version_ids()
            .await?
            .iter()
            .map(|id| self.snapshots.record_key(id))
            .collect();

        let keys = self.snapshots.record_keys().await?;
        Ok(keys
            .into_iter()
            .filter(|key| !referenced.contains(key))
            .collect())
    }

    /// Delete the records reported by [`orphaned_versions`](Self::orphaned_versions).
    ///
    /// Returns the number of records removed.
    #[tracing::instrument(name = "versions.remove_orphans", skip_all)]
    pub async fn remove_orphaned_versions(&self) -> Result<usize> {
        let orphans = self.orphaned_versions().await?;

        let mut removed = 0;
        for key in &orphans {
            match self.snapshots.delete_key(key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to delete orphaned snapshot"),
            }
        }

        info!(found = orphans.len(), removed, "Removed orphaned snapshots");
        Ok(removed)
    }

    fn should_prune(&self) -> bool {
        if self.prune_probability <= 0.0 {
            return false;
        }
        if self.prune_probability >= 1.0 {
            return true;
        }
        rand::rng().random::<f64>() < self.prune_probability
    }

    async fn resolve(&self, version_ids: &[String]) -> Vec<VersionSnapshot> {
        let loaded = join_all(
            version_ids
                .iter()
                .map(|id| async move { (id, self.snapshots.get(id).await) }),
        )
        .await;

        loaded
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(Some(snapshot)) => Some(snapshot),
                Ok(None) => {
                    warn!(version_id = %id, "Index references missing snapshot, skipping");
                    None
                }
                Err(e) => {
                    warn!(version_id = %id, error = %e, "Failed to load snapshot, skipping");
                    None
                }
            })
            .collect()
    }

    /// Best-effort delete. Returns (removed, failed) ids.
    async fn delete_snapshots(&self, version_ids: &[String]) -> (Vec<String>, Vec<String>) {
        let results = join_all(
            version_ids
                .iter()
                .map(|id| async move { (id, self.snapshots.delete(id).await) }),
        )
        .await;

        let mut removed = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(true) => removed.push(id.clone()),
                Ok(false) => debug!(version_id = %id, "Snapshot already gone"),
                Err(e) => {
                    warn!(version_id = %id, error = %e, "Failed to delete snapshot");
                    failed.push(id.clone());
                }
            }
        }
        (removed, failed)
    }
}

/// Newest first, given versions in index order.
///
/// Versions with equal timestamps come out in reverse index order, so the
/// one registered last is listed first.
fn sort_newest_first(versions: &mut [VersionSnapshot]) {
    versions.reverse();
    versions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
