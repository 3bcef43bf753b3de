//! VersionHistory interface step definitions.

use std::sync::Arc;

use chrono::{Duration, Utc};
use cucumber::{given, then, when, World};
use palimpsest::config::RetentionConfig;
use palimpsest::model::{DocumentState, VersionDiff, VersionSnapshot};
use palimpsest::services::VersionHistory;
use palimpsest::test_utils::MockDocumentSource;
use serde_json::json;

use crate::backend::{StorageBackend, StorageContext};

/// Test context for version history scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct VersionHistoryWorld {
    backend: StorageBackend,
    context: Option<StorageContext>,
    documents: Arc<MockDocumentSource>,
    history: Option<VersionHistory>,
    /// Every snapshot taken by a step, in creation order.
    created: Vec<VersionSnapshot>,
    pre_restore: Option<DocumentState>,
    restored: Option<DocumentState>,
    diff: Option<VersionDiff>,
    deleted: usize,
    last_error: Option<String>,
}

impl std::fmt::Debug for VersionHistoryWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionHistoryWorld")
            .field("backend", &self.backend)
            .field("context", &self.context)
            .field("created", &self.created.len())
            .field("restored", &self.restored)
            .field("diff", &self.diff)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl VersionHistoryWorld {
    fn new() -> Self {
        Self {
            backend: StorageBackend::from_env(),
            context: None,
            documents: Arc::new(MockDocumentSource::new()),
            history: None,
            created: Vec::new(),
            pre_restore: None,
            restored: None,
            diff: None,
            deleted: 0,
            last_error: None,
        }
    }

    fn history(&self) -> &VersionHistory {
        self.history
            .as_ref()
            .expect("Version history not initialized")
    }

    async fn live(&self, document_id: &str) -> DocumentState {
        self.documents
            .document(document_id)
            .await
            .unwrap_or_else(|| panic!("No live document {}", document_id))
    }

    async fn snapshot(&mut self, document_id: &str) {
        let state = self.live(document_id).await;
        let snapshot = self
            .history()
            .create_snapshot(document_id, &state)
            .await
            .expect("Failed to create snapshot");
        self.created.push(snapshot);
    }

    async fn restore(&mut self, document_id: &str, version_id: &str) {
        self.pre_restore = self.documents.document(document_id).await;
        match self.history().restore_version(document_id, version_id).await {
            Ok(state) => self.restored = Some(state),
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    fn first_created(&self) -> &VersionSnapshot {
        self.created.first().expect("No snapshot was created")
    }
}

fn content_for(title: &str) -> serde_json::Value {
    json!({
        "type": "doc",
        "content": [{"type": "paragraph", "content": [{"type": "text", "text": title}]}]
    })
}

fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

// --- Background ---

#[given(expr = "a version history backend with a retention cap of {int}")]
async fn given_backend(world: &mut VersionHistoryWorld, max_versions: usize) {
    println!("Using backend: {}", world.backend.name());
    let ctx = StorageContext::new(world.backend).await;
    let config = RetentionConfig::default().with_max_versions(max_versions);
    world.history = Some(VersionHistory::new(
        ctx.records.clone(),
        world.documents.clone(),
        &config,
    ));
    world.context = Some(ctx);
}

// --- Given steps ---

#[given(expr = "a document {string} titled {string}")]
async fn given_document(world: &mut VersionHistoryWorld, document_id: String, title: String) {
    let state = DocumentState::new(&document_id)
        .with_content(content_for(&title))
        .with_title(title);
    world.documents.set_document(state).await;
}

#[given(expr = "a document {string} titled {string} tagged {string}")]
async fn given_tagged_document(
    world: &mut VersionHistoryWorld,
    document_id: String,
    title: String,
    tags: String,
) {
    let state = DocumentState::new(&document_id)
        .with_content(content_for(&title))
        .with_title(title)
        .with_tags(parse_tags(&tags));
    world.documents.set_document(state).await;
}

// --- When steps ---

#[when(expr = "I snapshot document {string}")]
async fn when_snapshot(world: &mut VersionHistoryWorld, document_id: String) {
    world.snapshot(&document_id).await;
}

#[when(expr = "I snapshot document {string} {int} times")]
async fn when_snapshot_times(world: &mut VersionHistoryWorld, document_id: String, times: usize) {
    for _ in 0..times {
        world.snapshot(&document_id).await;
    }
}

#[when(expr = "the live document {string} is retitled {string}")]
async fn when_retitled(world: &mut VersionHistoryWorld, document_id: String, title: String) {
    let state = world
        .live(&document_id)
        .await
        .with_content(content_for(&title))
        .with_title(title);
    world.documents.set_document(state).await;
}

#[when(expr = "the live document {string} is tagged {string}")]
async fn when_tagged(world: &mut VersionHistoryWorld, document_id: String, tags: String) {
    let state = world.live(&document_id).await.with_tags(parse_tags(&tags));
    world.documents.set_document(state).await;
}

#[when(expr = "the live document {string} is deleted")]
async fn when_document_deleted(world: &mut VersionHistoryWorld, document_id: String) {
    world.documents.remove_document(&document_id).await;
}

#[when(expr = "I restore the first snapshot of {string}")]
async fn when_restore_first(world: &mut VersionHistoryWorld, document_id: String) {
    let version_id = world.first_created().id.clone();
    world.restore(&document_id, &version_id).await;
}

#[when(expr = "I restore version {string} of {string}")]
async fn when_restore(world: &mut VersionHistoryWorld, version_id: String, document_id: String) {
    world.restore(&document_id, &version_id).await;
}

#[when("I compare the first two snapshots")]
async fn when_compare(world: &mut VersionHistoryWorld) {
    assert!(world.created.len() >= 2, "Need two snapshots to compare");
    let (a, b) = (world.created[0].id.clone(), world.created[1].id.clone());
    world.diff = world
        .history()
        .compare_version_ids(&a, &b)
        .await
        .expect("Failed to compare versions");
}

#[when(expr = "I prune old versions of {string}")]
async fn when_prune(world: &mut VersionHistoryWorld, document_id: String) {
    world
        .history()
        .prune_old_versions(&document_id)
        .await
        .expect("Failed to prune versions");
}

#[when(expr = "I delete all versions of {string}")]
async fn when_delete_all(world: &mut VersionHistoryWorld, document_id: String) {
    world.deleted = world
        .history()
        .delete_all_versions(&document_id)
        .await
        .expect("Failed to delete versions");
}

#[when("the record of the first snapshot disappears")]
async fn when_record_disappears(world: &mut VersionHistoryWorld) {
    let id = world.first_created().id.clone();
    let deleted = world
        .history()
        .snapshots()
        .delete(&id)
        .await
        .expect("Failed to delete record");
    assert!(deleted);
}

#[when(expr = "a snapshot of {string} is written without being indexed")]
async fn when_unindexed_snapshot(world: &mut VersionHistoryWorld, document_id: String) {
    let state = world.live(&document_id).await;
    let stray = VersionSnapshot::capture(&document_id, &state, Utc::now() - Duration::hours(1));
    world
        .history()
        .snapshots()
        .put(&stray)
        .await
        .expect("Failed to write snapshot");
}

#[when("I remove orphaned records")]
async fn when_remove_orphans(world: &mut VersionHistoryWorld) {
    world
        .history()
        .remove_orphaned_versions()
        .await
        .expect("Failed to remove orphans");
}

// --- Then steps ---

#[then(expr = "listing versions of {string} returns {int} version(s)")]
async fn then_list_count(world: &mut VersionHistoryWorld, document_id: String, count: usize) {
    let versions = world.history().list_versions(&document_id).await;
    assert_eq!(versions.len(), count);
}

#[then(expr = "the newest version of {string} is titled {string}")]
async fn then_newest_title(world: &mut VersionHistoryWorld, document_id: String, title: String) {
    let versions = world.history().list_versions(&document_id).await;
    let newest = versions.first().expect("No versions listed");
    assert_eq!(newest.title, title);
}

#[then(expr = "the versions of {string} are sorted newest first")]
async fn then_sorted(world: &mut VersionHistoryWorld, document_id: String) {
    let versions = world.history().list_versions(&document_id).await;
    assert!(versions
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));
}

#[then("the first snapshot is absent")]
async fn then_first_absent(world: &mut VersionHistoryWorld) {
    let first = world.first_created().clone();
    let versions = world.history().list_versions(&first.document_id).await;
    assert!(versions.iter().all(|v| v.id != first.id));
    assert!(world
        .history()
        .get_version(&first.id)
        .await
        .expect("Failed to read version")
        .is_none());
}

#[then("the last snapshot is present")]
async fn then_last_present(world: &mut VersionHistoryWorld) {
    let last = world.created.last().expect("No snapshot was created").clone();
    let versions = world.history().list_versions(&last.document_id).await;
    assert_eq!(versions.first().map(|v| v.id.as_str()), Some(last.id.as_str()));
}

#[then(expr = "the restored document is titled {string}")]
async fn then_restored_title(world: &mut VersionHistoryWorld, title: String) {
    let restored = world.restored.as_ref().expect("Nothing was restored");
    assert_eq!(restored.title.as_deref(), Some(title.as_str()));
    assert_eq!(restored.content, content_for(&title));
}

#[then(expr = "listing versions of {string} includes a version titled {string}")]
async fn then_includes_title(world: &mut VersionHistoryWorld, document_id: String, title: String) {
    let versions = world.history().list_versions(&document_id).await;
    assert!(versions.iter().any(|v| v.title == title));
}

#[then(expr = "the newest version of {string} has the pre-restore content")]
async fn then_safety_snapshot(world: &mut VersionHistoryWorld, document_id: String) {
    let before = world.pre_restore.clone().expect("No pre-restore state");
    let versions = world.history().list_versions(&document_id).await;
    let newest = versions.first().expect("No versions listed");
    assert_eq!(newest.content, before.content);
}

#[then(expr = "the live document {string} is still titled {string}")]
async fn then_live_title(world: &mut VersionHistoryWorld, document_id: String, title: String) {
    let live = world.live(&document_id).await;
    assert_eq!(live.title.as_deref(), Some(title.as_str()));
}

#[then(expr = "the operation fails with {string}")]
async fn then_fails_with(world: &mut VersionHistoryWorld, message: String) {
    let error = world.last_error.as_deref().expect("Operation did not fail");
    assert!(
        error.contains(&message),
        "expected error containing {:?}, got {:?}",
        message,
        error
    );
}

#[then("only tags changed")]
async fn then_only_tags(world: &mut VersionHistoryWorld) {
    let diff = world.diff.expect("No comparison result");
    assert!(!diff.title_changed);
    assert!(!diff.content_changed);
    assert!(diff.tags_changed);
    assert!(!diff.emoji_changed);
}

#[then(expr = "{int} versions were deleted")]
async fn then_deleted_count(world: &mut VersionHistoryWorld, count: usize) {
    assert_eq!(world.deleted, count);
}

#[then(expr = "the index has no entry for {string}")]
async fn then_no_index_entry(world: &mut VersionHistoryWorld, document_id: String) {
    assert!(world.history().index().get(&document_id).await.is_none());
}

#[then(expr = "there is/are {int} orphaned record(s)")]
async fn then_orphan_count(world: &mut VersionHistoryWorld, count: usize) {
    let orphans = world
        .history()
        .orphaned_versions()
        .await
        .expect("Failed to scan for orphans");
    assert_eq!(orphans.len(), count);
}
