//! Palimpsest - Snapshot & Version Retention Engine
//!
//! Captures point-in-time copies of rich-text documents, keeps a bounded
//! history per document, and restores any captured version without losing
//! the state it replaces.
//!
//! The engine is layered bottom-up:
//! - [`storage`]: the key/value record collaborator (memory, fs, sqlite)
//! - [`repository`]: snapshot records and the per-document version index
//! - [`services`]: the [`VersionHistory`](services::VersionHistory) coordinator

pub mod config;
pub mod model;
pub mod repository;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
