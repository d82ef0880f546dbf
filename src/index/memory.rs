//! In-memory [`VectorIndex`] implementation.
//!
//! A `HashMap` keyed by chunk key behind `std::sync::RwLock`. Queries are
//! brute-force cosine similarity over every stored vector in the requested
//! project. Suitable for tests and single-process serving; vectors do not
//! survive the process.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::PipelineError;

use super::{IndexEntry, QueryMatch, VectorIndex};

/// In-memory vector index.
pub struct InMemoryIndex {
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), PipelineError> {
        let mut stored = self.entries.write().unwrap();
        for entry in entries {
            stored.insert(entry.key.clone(), entry.clone());
        }
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), PipelineError> {
        let mut stored = self.entries.write().unwrap();
        stored.retain(|_, e| e.chunk.document_id != document_id);
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        project_id: &str,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, PipelineError> {
        let stored = self.entries.read().unwrap();
        let mut matches: Vec<QueryMatch> = stored
            .values()
            .filter(|e| e.chunk.project_id == project_id)
            .map(|e| QueryMatch {
                document_id: e.chunk.document_id.clone(),
                project_id: e.chunk.project_id.clone(),
                organization_id: e.chunk.organization_id.clone(),
                chunk_index: e.chunk.index,
                text: e.chunk.text.clone(),
                score: cosine_similarity(vector, &e.vector),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentChunk;

    fn chunk(document_id: &str, project_id: &str, index: usize, text: &str) -> DocumentChunk {
        DocumentChunk {
            document_id: document_id.to_string(),
            project_id: project_id.to_string(),
            organization_id: "org-1".to_string(),
            index,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn query_never_crosses_projects() {
        let index = InMemoryIndex::new();
        // Chunk Y (project B) is strictly nearer to the query vector than
        // chunk X (project A); a project-A query must still return only X.
        let x = IndexEntry::new(&chunk("doc-x", "A", 0, "chunk x"), vec![0.95, 0.31, 0.0]);
        let y = IndexEntry::new(&chunk("doc-y", "B", 0, "chunk y"), vec![1.0, 0.0, 0.0]);
        index.upsert(&[x, y]).await.unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0], "A", 10).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].document_id, "doc-x");
        assert_eq!(matches[0].project_id, "A");
    }

    #[tokio::test]
    async fn upsert_overwrites_same_key() {
        let index = InMemoryIndex::new();
        let first = IndexEntry::new(&chunk("doc-1", "A", 0, "old text"), vec![1.0, 0.0]);
        let second = IndexEntry::new(&chunk("doc-1", "A", 0, "new text"), vec![0.0, 1.0]);
        index.upsert(&[first]).await.unwrap();
        index.upsert(&[second]).await.unwrap();

        assert_eq!(index.len(), 1);
        let matches = index.query(&[0.0, 1.0], "A", 1).await.unwrap();
        assert_eq!(matches[0].text, "new text");
    }

    #[tokio::test]
    async fn delete_document_purges_all_of_its_keys() {
        let index = InMemoryIndex::new();
        let entries: Vec<IndexEntry> = (0..3)
            .map(|i| IndexEntry::new(&chunk("doc-1", "A", i, "t"), vec![1.0, 0.0]))
            .collect();
        let other = IndexEntry::new(&chunk("doc-2", "A", 0, "keep"), vec![1.0, 0.0]);
        index.upsert(&entries).await.unwrap();
        index.upsert(&[other]).await.unwrap();

        index.delete_document("doc-1").await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains_key("doc-2-chunk-0"));
        assert!(!index.contains_key("doc-1-chunk-0"));
    }

    #[tokio::test]
    async fn query_ranks_by_similarity_and_truncates() {
        let index = InMemoryIndex::new();
        let near = IndexEntry::new(&chunk("doc-near", "A", 0, "near"), vec![1.0, 0.0]);
        let mid = IndexEntry::new(&chunk("doc-mid", "A", 0, "mid"), vec![0.7, 0.7]);
        let far = IndexEntry::new(&chunk("doc-far", "A", 0, "far"), vec![0.0, 1.0]);
        index.upsert(&[far, near, mid]).await.unwrap();

        let matches = index.query(&[1.0, 0.0], "A", 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].document_id, "doc-near");
        assert_eq!(matches[1].document_id, "doc-mid");
    }
}
