//! Public-facing version history services.
//!
//! - [`VersionHistory`]: create, list, restore, prune and delete versions
//! - [`compare_versions`]: pure field-level comparison of two snapshots

pub mod diff;
pub mod version_history;

pub use diff::{compare_versions, content_changed};
pub use version_history::{DocumentSource, PruneOutcome, Result, VersionError, VersionHistory};
