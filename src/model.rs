//! Record types persisted and exchanged by the version engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Title captured when the live document has none.
pub const UNTITLED: &str = "Untitled";

/// Live document state as handed over by the editing layer.
///
/// Only `title`, `content`, `tags` and `emoji` are versioned. Everything else
/// the editing layer stores alongside them (creation time, parent page, sort
/// order, ...) lands in `extra` and passes through a restore untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }
}

/// Size figures computed once at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Byte length of the compact JSON serialization of the content.
    pub content_length: usize,
    /// Number of nodes in the content tree.
    pub block_count: usize,
}

impl SnapshotMetadata {
    /// Measure a content tree.
    ///
    /// A `null` content is measured as an empty object.
    pub fn measure(content: &Value) -> Self {
        let content_length = match content {
            Value::Null => Value::Object(Map::new()).to_string().len(),
            other => other.to_string().len(),
        };
        Self {
            content_length,
            block_count: count_blocks(content),
        }
    }
}

/// Count the nodes of a rich-text tree.
///
/// Nodes live in `content` arrays, starting at the root's `content` member and
/// recursing into each node's own `content` array. Anything else counts as
/// zero nodes.
pub fn count_blocks(content: &Value) -> usize {
    fn count_nodes(nodes: &[Value]) -> usize {
        nodes
            .iter()
            .map(|node| {
                1 + node
                    .get("content")
                    .and_then(Value::as_array)
                    .map_or(0, |children| count_nodes(children))
            })
            .sum()
    }

    content
        .get("content")
        .and_then(Value::as_array)
        .map_or(0, |nodes| count_nodes(nodes))
}

/// Immutable copy of a document's user-visible fields at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub id: String,
    pub document_id: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub content: Value,
    pub tags: Vec<String>,
    pub emoji: Option<String>,
    pub metadata: SnapshotMetadata,
}

impl VersionSnapshot {
    /// Capture `state` for `document_id` at `at`.
    pub fn capture(document_id: &str, state: &DocumentState, at: DateTime<Utc>) -> Self {
        let title = state
            .title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
            .to_string();

        Self {
            id: version_id(document_id, at),
            document_id: document_id.to_string(),
            timestamp: at,
            title,
            metadata: SnapshotMetadata::measure(&state.content),
            content: state.content.clone(),
            tags: state.tags.clone(),
            emoji: state.emoji.clone(),
        }
    }
}

/// Build a version id from the owning document and the capture instant.
pub fn version_id(document_id: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", document_id, at.timestamp_millis())
}

/// Per-document list of version ids, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionIndexEntry {
    pub document_id: String,
    pub versions: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl VersionIndexEntry {
    pub fn new(document_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            document_id: document_id.to_string(),
            versions: Vec::new(),
            last_updated: now,
        }
    }
}

/// The whole index record: document id -> entry.
pub type VersionIndexRecord = BTreeMap<String, VersionIndexEntry>;

/// Metadata of both sides of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffMetadata {
    pub version1: SnapshotMetadata,
    pub version2: SnapshotMetadata,
}

/// Field-level change summary between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDiff {
    pub title_changed: bool,
    pub content_changed: bool,
    pub tags_changed: bool,
    pub emoji_changed: bool,
    pub metadata: DiffMetadata,
}

impl VersionDiff {
    /// True when any versioned field differs.
    pub fn has_changes(&self) -> bool {
        self.title_changed || self.content_changed || self.tags_changed || self.emoji_changed
    }
}
