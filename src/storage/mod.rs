//! Storage collaborator.
//!
//! The version engine never touches files or databases directly. Every
//! persisted byte goes through [`RecordStore`], a flat key/value interface
//! with `/`-separated logical keys.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

mod config;
pub mod fs;
pub mod mock;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{StorageConfig, StorageType};
pub use fs::FsRecordStore;
pub use mock::MockRecordStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid record key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Interface for record persistence.
///
/// Missing keys are not errors: reads return `None` and deletes return
/// `false`, so callers can filter dangling references and clean up
/// idempotently. Retries, if any, belong to the implementation.
///
/// Implementations:
/// - `MockRecordStore`: In-memory storage
/// - `FsRecordStore`: One JSON file per key under a root directory
/// - `SqliteRecordStore`: SQLite storage
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the bytes stored at `key`.
    async fn read_record(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `bytes` at `key`, replacing any existing record.
    async fn write_record(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Delete the record at `key`.
    ///
    /// Returns `false` if no record existed.
    async fn delete_record(&self, key: &str) -> Result<bool>;

    /// List all keys starting with `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn RecordStore>> {
    info!("Storage: {:?} at {}", config.storage_type, config.path);

    match config.storage_type {
        StorageType::Memory => Ok(Arc::new(MockRecordStore::new())),
        StorageType::Fs => Ok(Arc::new(FsRecordStore::open(&config.path).await?)),
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let store = SqliteRecordStore::connect(&format!("sqlite:{}?mode=rwc", config.path)).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err(StorageError::Backend("sqlite feature not enabled".to_string()))
        }
    }
}
