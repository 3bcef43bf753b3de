//! Backend factory for interface tests.
//!
//! Provides a unified interface to create record stores based on environment configuration.

use std::env;
use std::sync::Arc;

use palimpsest::storage::{FsRecordStore, MockRecordStore, RecordStore};

#[cfg(feature = "sqlite")]
use palimpsest::storage::SqliteRecordStore;

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Fs,
    Sqlite,
}

impl StorageBackend {
    pub fn from_env() -> Self {
        match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "fs" => StorageBackend::Fs,
            "sqlite" => StorageBackend::Sqlite,
            _ => StorageBackend::Memory,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Fs => "fs",
            StorageBackend::Sqlite => "sqlite",
        }
    }
}

/// Holds the record store for a backend.
pub struct StorageContext {
    pub records: Arc<dyn RecordStore>,
    /// Keeps the fs backend's directory alive for the scenario.
    #[allow(dead_code)]
    temp_dir: Option<tempfile::TempDir>,
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("records", &"<dyn RecordStore>")
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl StorageContext {
    /// Create a fresh, empty storage context for the configured backend.
    pub async fn new(backend: StorageBackend) -> Self {
        match backend {
            StorageBackend::Memory => Self::create_memory(),
            StorageBackend::Fs => Self::create_fs().await,
            StorageBackend::Sqlite => Self::create_sqlite().await,
        }
    }

    fn create_memory() -> Self {
        StorageContext {
            records: Arc::new(MockRecordStore::new()),
            temp_dir: None,
        }
    }

    async fn create_fs() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = FsRecordStore::open(dir.path())
            .await
            .expect("Failed to open fs record store");

        StorageContext {
            records: Arc::new(store),
            temp_dir: Some(dir),
        }
    }

    #[cfg(feature = "sqlite")]
    async fn create_sqlite() -> Self {
        let store = SqliteRecordStore::connect("sqlite::memory:")
            .await
            .expect("Failed to create SQLite store");

        StorageContext {
            records: Arc::new(store),
            temp_dir: None,
        }
    }

    #[cfg(not(feature = "sqlite"))]
    async fn create_sqlite() -> Self {
        panic!("SQLite feature not enabled. Build with --features sqlite");
    }
}
