//! Test utilities and mock implementations.
//!
//! Mock editing-layer collaborator for exercising the version history
//! coordinator without a real document store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::DocumentState;
use crate::services::DocumentSource;
use crate::storage::StorageError;

/// Mock document source that keeps live documents in memory.
#[derive(Default)]
pub struct MockDocumentSource {
    documents: RwLock<HashMap<String, DocumentState>>,
    fail_on_load: RwLock<bool>,
}

impl MockDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace the live state of a document.
    pub async fn set_document(&self, state: DocumentState) {
        self.documents.write().await.insert(state.id.clone(), state);
    }

    pub async fn remove_document(&self, document_id: &str) {
        self.documents.write().await.remove(document_id);
    }

    pub async fn document(&self, document_id: &str) -> Option<DocumentState> {
        self.documents.read().await.get(document_id).cloned()
    }

    pub async fn set_fail_on_load(&self, fail: bool) {
        *self.fail_on_load.write().await = fail;
    }
}

#[async_trait]
impl DocumentSource for MockDocumentSource {
    async fn load_document(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentState>, StorageError> {
        if *self.fail_on_load.read().await {
            return Err(StorageError::Backend(format!(
                "injected load failure for {}",
                document_id
            )));
        }
        Ok(self.documents.read().await.get(document_id).cloned())
    }
}
