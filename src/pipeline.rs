//! Ingestion pipeline orchestration.
//!
//! Drives one document through `pending → processing → completed | failed`:
//! fetch bytes → extract text → persist it → chunk → purge the document's
//! old index keys → embed and upsert each chunk → persist the final status.
//!
//! Each document's run is an independent sequential task; runs on different
//! documents may proceed concurrently without coordination. Two runs on the
//! *same* document are serialized by the store's conditional claim — the
//! loser gets [`PipelineError::AlreadyProcessing`].
//!
//! Failures are terminal for the run: the record is marked `failed` with the
//! triggering message and nothing is retried. A later reprocess starts over
//! from scratch; because the index is purged at the start of every run,
//! partial upserts from a failed run cannot leave stale vectors behind.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::blob::{self, BlobStore};
use crate::chunk;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder};
use crate::error::PipelineError;
use crate::extract;
use crate::index::{self, IndexEntry, VectorIndex};
use crate::models::{DocumentRecord, ProcessingStatus};
use crate::store::sqlite::SqliteDocumentStore;
use crate::store::DocumentStore;

/// Outcome of a successful pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOutcome {
    /// Chunks embedded and upserted (may be zero for empty documents).
    pub chunks_count: usize,
}

/// The pipeline orchestrator and its injected collaborators.
///
/// Constructed once per process from the loaded [`Config`]; every component
/// receives the same clients rather than re-initializing them per call site.
pub struct Pipeline {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    window_chars: usize,
    overlap_chars: usize,
    extraction_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            blobs,
            embedder,
            index,
            window_chars: config.chunking.window_chars,
            overlap_chars: config.chunking.overlap_chars,
            extraction_timeout: Duration::from_secs(config.extraction.timeout_secs),
        }
    }

    /// Build a pipeline with production collaborators from config.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));
        let blobs = blob::create_blob_store(&config.storage)?;
        let embedder = embedding::create_embedder(&config.embedding)?;
        let index = index::create_index(&config.index)?;
        Ok(Self::new(store, blobs, embedder, index, config))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Run the full ingestion pipeline for one document.
    ///
    /// On any stage failure the document is marked `failed` with the error's
    /// message and the error is returned; the record is the permanent record
    /// of the failure, so event-style callers may ignore the `Err` while the
    /// HTTP flow forwards it.
    pub async fn process_document(&self, document_id: &str) -> Result<ProcessOutcome, PipelineError> {
        let doc = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("document {}", document_id)))?;

        if !self.store.claim_for_processing(document_id).await? {
            return Err(PipelineError::AlreadyProcessing(document_id.to_string()));
        }

        match self.run_stages(&doc).await {
            Ok(outcome) => {
                self.store
                    .set_status(
                        document_id,
                        &ProcessingStatus::completed(outcome.chunks_count as i64),
                    )
                    .await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(status_err) = self
                    .store
                    .set_status(document_id, &ProcessingStatus::failed(e.to_string()))
                    .await
                {
                    eprintln!(
                        "Warning: failed to record failure for document {}: {}",
                        document_id, status_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_stages(&self, doc: &DocumentRecord) -> Result<ProcessOutcome, PipelineError> {
        let bytes = self.blobs.fetch(&doc.file_path).await?;

        let text = self.extract_with_timeout(bytes, doc.file_type.clone()).await?;
        self.store.set_extracted_text(&doc.id, &text).await?;

        let chunks = chunk::split_document(doc, &text, self.window_chars, self.overlap_chars)?;

        // Purge the document's old key range first: a shrunk document must
        // not keep stale vectors under its higher-index keys.
        self.index.delete_document(&doc.id).await?;

        for piece in &chunks {
            let vector = self.embedder.embed_one(&piece.text).await?;
            let entry = IndexEntry::new(piece, vector);
            self.index.upsert(std::slice::from_ref(&entry)).await?;
        }

        Ok(ProcessOutcome {
            chunks_count: chunks.len(),
        })
    }

    /// Extraction is CPU-bound library code; run it off the async runtime and
    /// bound it so a pathological file cannot stall the orchestrator.
    async fn extract_with_timeout(
        &self,
        bytes: Vec<u8>,
        file_type: String,
    ) -> Result<String, PipelineError> {
        let handle =
            tokio::task::spawn_blocking(move || extract::extract_text(&bytes, &file_type));

        match tokio::time::timeout(self.extraction_timeout, handle).await {
            Err(_) => Err(PipelineError::ExtractionFailed(format!(
                "timed out after {}s",
                self.extraction_timeout.as_secs()
            ))),
            Ok(Err(join_err)) => Err(PipelineError::ExtractionFailed(join_err.to_string())),
            Ok(Ok(result)) => result.map_err(PipelineError::from),
        }
    }
}

/// CLI entry point — process one document and print the outcome.
pub async fn run_process(config: &Config, document_id: &str) -> Result<()> {
    let pipeline = Pipeline::from_config(config).await?;

    match pipeline.process_document(document_id).await {
        Ok(outcome) => {
            println!("process {}", document_id);
            println!("  chunks embedded: {}", outcome.chunks_count);
            println!("ok");
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
