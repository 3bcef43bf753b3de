//! Repository layer for version records.
//!
//! Both repositories sit on top of a shared [`RecordStore`](crate::storage::RecordStore)
//! and own their slice of the key namespace:
//! - [`SnapshotRepository`]: one immutable record per version
//! - [`VersionIndex`]: a single record mapping documents to version ids

pub mod snapshot;
pub mod version_index;

pub use snapshot::SnapshotRepository;
pub use version_index::VersionIndex;

/// Key of the index record within a namespace.
pub const INDEX_RECORD: &str = "_index";

/// Characters that may not appear in a key segment derived from an id.
const RESERVED_KEY_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make an id safe to use as a single key segment.
///
/// Reserved characters become `_`, as does a leading `.` (dot-files are
/// reserved for backend bookkeeping).
pub fn sanitize_key_segment(id: &str) -> String {
    let mut out: String = id
        .chars()
        .map(|c| if RESERVED_KEY_CHARS.contains(&c) { '_' } else { c })
        .collect();
    if out.starts_with('.') {
        out.replace_range(0..1, "_");
    }
    out
}

/// Normalize a configured namespace into a key prefix without slashes at the ends.
pub(crate) fn normalize_namespace(namespace: &str) -> String {
    namespace.trim_matches('/').to_string()
}
