//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the pipeline's integration point with the
//! external similarity store. Implementations:
//! - **[`memory::InMemoryIndex`]** — brute-force cosine over an in-process
//!   map; used by tests and single-process serving.
//! - **[`pinecone::PineconeIndex`]** — REST client for a Pinecone index.
//!
//! Entries are keyed deterministically per chunk (`{documentId}-chunk-{i}`),
//! so upserts from a re-run overwrite rather than duplicate. Queries are
//! always scoped to one project: organizations share a physical index, and a
//! result from another project would be a correctness bug, not a tuning
//! issue.

pub mod memory;
pub mod pinecone;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::error::PipelineError;
use crate::models::DocumentChunk;

/// One entry written to the vector index: the chunk's deterministic key, its
/// embedding, and the metadata bag stored alongside it.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub key: String,
    pub vector: Vec<f32>,
    pub chunk: DocumentChunk,
}

impl IndexEntry {
    pub fn new(chunk: &DocumentChunk, vector: Vec<f32>) -> Self {
        Self {
            key: chunk.key(),
            vector,
            chunk: chunk.clone(),
        }
    }
}

/// One hit returned from a similarity query.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub document_id: String,
    pub project_id: String,
    pub organization_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Abstract similarity index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Write or overwrite entries by key. Idempotent per key.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), PipelineError>;

    /// Purge every entry belonging to a document.
    ///
    /// Called before each fresh ingestion run so a shrunk document cannot
    /// leave stale vectors behind under its old higher-index keys.
    async fn delete_document(&self, document_id: &str) -> Result<(), PipelineError>;

    /// Return the `top_k` nearest entries for `vector`, restricted to
    /// `project_id`. The filter is mandatory.
    async fn query(
        &self,
        vector: &[f32],
        project_id: &str,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, PipelineError>;
}

/// Create the appropriate [`VectorIndex`] from configuration.
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "memory" => Ok(Arc::new(memory::InMemoryIndex::new())),
        "pinecone" => Ok(Arc::new(pinecone::PineconeIndex::new(config)?)),
        other => bail!("Unknown index provider: {}", other),
    }
}
