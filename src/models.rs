//! Core data models used throughout docpipe.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and query pipelines.

use serde::Serialize;

/// Processing lifecycle state of a document.
///
/// `Pending` is the implicit initial state of a freshly uploaded document.
/// `Completed` and `Failed` are terminal for a given run; a manual reprocess
/// re-enters `Processing` and may overwrite a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Pending => "pending",
            ProcessingState::Processing => "processing",
            ProcessingState::Completed => "completed",
            ProcessingState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingState::Pending),
            "processing" => Some(ProcessingState::Processing),
            "completed" => Some(ProcessingState::Completed),
            "failed" => Some(ProcessingState::Failed),
            _ => None,
        }
    }
}

/// Status record persisted on a document.
///
/// Invariants: `completed == true` iff `state == Completed`; `chunks_count`
/// is set only by [`ProcessingStatus::completed`]; a failed status always
/// carries a non-empty error message. Construct through the helpers below
/// rather than by hand.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStatus {
    #[serde(rename = "status")]
    pub state: ProcessingState,
    pub completed: bool,
    #[serde(rename = "chunksCount", skip_serializing_if = "Option::is_none")]
    pub chunks_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingStatus {
    pub fn pending() -> Self {
        Self {
            state: ProcessingState::Pending,
            completed: false,
            chunks_count: None,
            error: None,
        }
    }

    pub fn processing() -> Self {
        Self {
            state: ProcessingState::Processing,
            completed: false,
            chunks_count: None,
            error: None,
        }
    }

    pub fn completed(chunks_count: i64) -> Self {
        Self {
            state: ProcessingState::Completed,
            completed: true,
            chunks_count: Some(chunks_count),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let message = error.into();
        let message = if message.is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        Self {
            state: ProcessingState::Failed,
            completed: false,
            chunks_count: None,
            error: Some(message),
        }
    }
}

/// One uploaded file, as stored in the document database.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub project_id: String,
    pub organization_id: String,
    /// Declared MIME type (e.g. `application/pdf`).
    pub file_type: String,
    /// Opaque storage locator understood by the blob store.
    pub file_path: String,
    /// Null until extraction completes.
    pub extracted_text: Option<String>,
    pub processing: ProcessingStatus,
}

/// One overlapping slice of a document's extracted text.
///
/// Chunks are transient: produced during ingestion, written once to the
/// vector index as metadata, never persisted as first-class records.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub document_id: String,
    pub project_id: String,
    pub organization_id: String,
    /// Zero-based position among the document's kept (non-empty) chunks.
    pub index: usize,
    pub text: String,
}

impl DocumentChunk {
    /// Deterministic vector-index key: `{documentId}-chunk-{index}`.
    ///
    /// Re-processing a document produces the same keys, so upserts overwrite
    /// rather than duplicate.
    pub fn key(&self) -> String {
        crate::chunk::chunk_key(&self.document_id, self.index)
    }
}

/// A retrieval hit returned from the query path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub document_id: String,
    pub text: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_status_satisfies_invariants() {
        let s = ProcessingStatus::completed(7);
        assert_eq!(s.state, ProcessingState::Completed);
        assert!(s.completed);
        assert_eq!(s.chunks_count, Some(7));
        assert!(s.error.is_none());
    }

    #[test]
    fn failed_status_always_carries_a_message() {
        let s = ProcessingStatus::failed("");
        assert_eq!(s.state, ProcessingState::Failed);
        assert!(!s.completed);
        assert!(!s.error.unwrap().is_empty());
    }

    #[test]
    fn non_terminal_states_are_not_completed() {
        assert!(!ProcessingStatus::pending().completed);
        assert!(!ProcessingStatus::processing().completed);
    }

    #[test]
    fn state_round_trips_through_strings() {
        for state in [
            ProcessingState::Pending,
            ProcessingState::Processing,
            ProcessingState::Completed,
            ProcessingState::Failed,
        ] {
            assert_eq!(ProcessingState::parse(state.as_str()), Some(state));
        }
        assert_eq!(ProcessingState::parse("queued"), None);
    }
}
