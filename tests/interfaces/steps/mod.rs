//! Cucumber step definitions for interface tests.

pub mod version_history;
