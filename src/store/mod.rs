//! Document database abstraction.
//!
//! The [`DocumentStore`] trait covers everything the pipeline needs from the
//! document database: reading records, the conditional claim that serializes
//! runs on one document, and persisting extracted text and status.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::{DocumentRecord, ProcessingStatus};

/// Abstract document database.
///
/// The status record of a document is owned exclusively by the orchestrator
/// for the duration of one run; [`claim_for_processing`](DocumentStore::claim_for_processing)
/// is the conditional write that establishes that ownership.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document record.
    async fn insert_document(&self, doc: &DocumentRecord) -> Result<(), PipelineError>;

    /// Fetch a document by id. `None` when it does not exist.
    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>, PipelineError>;

    /// Atomically move a document into `processing`, unless it is already
    /// there. Returns `false` when another run holds the claim (or the
    /// document does not exist). Succeeds from `pending`, `failed`, and
    /// `completed` — a manual reprocess may overwrite a terminal state.
    async fn claim_for_processing(&self, id: &str) -> Result<bool, PipelineError>;

    /// Persist the extracted text onto the record.
    async fn set_extracted_text(&self, id: &str, text: &str) -> Result<(), PipelineError>;

    /// Persist a status object onto the record.
    async fn set_status(&self, id: &str, status: &ProcessingStatus) -> Result<(), PipelineError>;
}
