//! In-memory [`DocumentStore`] implementation for testing.
//!
//! A `HashMap` behind `std::sync::RwLock`; the claim is made atomic by
//! performing the check-and-set under the write lock.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::{DocumentRecord, ProcessingState, ProcessingStatus};

use super::DocumentStore;

/// In-memory document store.
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<String, DocumentRecord>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_document(&self, doc: &DocumentRecord) -> Result<(), PipelineError> {
        let mut docs = self.docs.write().unwrap();
        docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>, PipelineError> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(id).cloned())
    }

    async fn claim_for_processing(&self, id: &str) -> Result<bool, PipelineError> {
        let mut docs = self.docs.write().unwrap();
        match docs.get_mut(id) {
            Some(doc) if doc.processing.state == ProcessingState::Processing => Ok(false),
            Some(doc) => {
                doc.processing = ProcessingStatus::processing();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_extracted_text(&self, id: &str, text: &str) -> Result<(), PipelineError> {
        let mut docs = self.docs.write().unwrap();
        match docs.get_mut(id) {
            Some(doc) => {
                doc.extracted_text = Some(text.to_string());
                Ok(())
            }
            None => Err(PipelineError::NotFound(format!("document {}", id))),
        }
    }

    async fn set_status(&self, id: &str, status: &ProcessingStatus) -> Result<(), PipelineError> {
        let mut docs = self.docs.write().unwrap();
        match docs.get_mut(id) {
            Some(doc) => {
                doc.processing = status.clone();
                Ok(())
            }
            None => Err(PipelineError::NotFound(format!("document {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            project_id: "proj-1".to_string(),
            organization_id: "org-1".to_string(),
            file_type: "application/pdf".to_string(),
            file_path: format!("uploads/{}.pdf", id),
            extracted_text: None,
            processing: ProcessingStatus::pending(),
        }
    }

    #[tokio::test]
    async fn claim_is_exclusive_while_processing() {
        let store = InMemoryDocumentStore::new();
        store.insert_document(&doc("d1")).await.unwrap();

        assert!(store.claim_for_processing("d1").await.unwrap());
        assert!(!store.claim_for_processing("d1").await.unwrap());

        // A terminal state releases the claim.
        store
            .set_status("d1", &ProcessingStatus::failed("boom"))
            .await
            .unwrap();
        assert!(store.claim_for_processing("d1").await.unwrap());
    }

    #[tokio::test]
    async fn claim_on_missing_document_fails() {
        let store = InMemoryDocumentStore::new();
        assert!(!store.claim_for_processing("nope").await.unwrap());
    }

    #[tokio::test]
    async fn extracted_text_round_trips() {
        let store = InMemoryDocumentStore::new();
        store.insert_document(&doc("d1")).await.unwrap();
        store.set_extracted_text("d1", "hello").await.unwrap();
        let got = store.get_document("d1").await.unwrap().unwrap();
        assert_eq!(got.extracted_text.as_deref(), Some("hello"));
    }
}
