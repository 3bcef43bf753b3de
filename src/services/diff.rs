//! Snapshot comparison.

use crate::model::{DiffMetadata, DocumentState, VersionDiff, VersionSnapshot};

/// Compare two snapshots field by field.
///
/// Content is compared by deep structural equality, not by any semantic
/// diff. Returns `None` if either side is missing.
pub fn compare_versions(
    version1: Option<&VersionSnapshot>,
    version2: Option<&VersionSnapshot>,
) -> Option<VersionDiff> {
    let (a, b) = (version1?, version2?);

    Some(VersionDiff {
        title_changed: a.title != b.title,
        content_changed: a.content != b.content,
        tags_changed: a.tags != b.tags,
        emoji_changed: a.emoji != b.emoji,
        metadata: DiffMetadata {
            version1: a.metadata,
            version2: b.metadata,
        },
    })
}

/// Whether `current` carries different content than `previous`.
///
/// This is the usual test the editing layer applies before asking for a
/// snapshot; the engine itself snapshots whenever it is asked.
pub fn content_changed(previous: &DocumentState, current: &DocumentState) -> bool {
    previous.content != current.content
}
