//! In-memory RecordStore.
//!
//! Backs the `memory` storage type and doubles as the test backend, with
//! switches to make individual operations fail.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{RecordStore, Result, StorageError};

/// Record store that keeps everything in a sorted map.
#[derive(Default)]
pub struct MockRecordStore {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
    fail_on_read: RwLock<bool>,
    fail_on_write: RwLock<bool>,
    fail_on_delete: RwLock<bool>,
    /// Keys whose reads fail even when `fail_on_read` is off.
    failing_keys: RwLock<Vec<String>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    /// Make reads and deletes of a single key fail.
    pub async fn fail_key(&self, key: &str) {
        self.failing_keys.write().await.push(key.to_string());
    }

    pub async fn stored_count(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.records.read().await.contains_key(key)
    }

    async fn key_fails(&self, key: &str) -> bool {
        self.failing_keys.read().await.iter().any(|k| k == key)
    }
}

fn injected(op: &str, key: &str) -> StorageError {
    StorageError::Backend(format!("injected {} failure for {}", op, key))
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn read_record(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if *self.fail_on_read.read().await || self.key_fails(key).await {
            return Err(injected("read", key));
        }
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn write_record(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(injected("write", key));
        }
        self.records.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete_record(&self, key: &str) -> Result<bool> {
        if *self.fail_on_delete.read().await || self.key_fails(key).await {
            return Err(injected("delete", key));
        }
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
