//! Pipeline error taxonomy.
//!
//! Every stage of the ingestion pipeline maps its failures into
//! [`PipelineError`] so the orchestrator can persist a single descriptive
//! message onto the document record. Extraction has its own finer-grained
//! [`ExtractError`](crate::extract::ExtractError); it converts into the
//! variants here.

use crate::extract::ExtractError;

/// Error raised by a pipeline stage.
///
/// `UnsupportedFileType`, `ExtractionFailed`, `EmbeddingFailed`, and
/// `IndexUnavailable` are fatal for the current run and mark the document
/// `failed`. `ChunkerMisconfigured` is a configuration error and should be
/// caught at startup, before any document is processed. `NotFound` and
/// `AlreadyProcessing` are surfaced to the caller without mutating the
/// document beyond what has already happened.
#[derive(Debug)]
pub enum PipelineError {
    /// Declared MIME type has no extraction rule.
    UnsupportedFileType(String),
    /// The extraction library rejected the file (corrupt, encrypted, malformed).
    ExtractionFailed(String),
    /// Window/overlap configuration would not make progress.
    ChunkerMisconfigured { window: usize, overlap: usize },
    /// Embedding provider call failed (network, quota, malformed input).
    EmbeddingFailed(String),
    /// Vector index upsert/delete/query failed.
    IndexUnavailable(String),
    /// The byte-fetch collaborator could not produce the file's bytes.
    StorageUnavailable(String),
    /// The document database rejected a read or write.
    StoreFailed(String),
    /// Referenced document does not exist.
    NotFound(String),
    /// Another run currently owns this document's status record.
    AlreadyProcessing(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::UnsupportedFileType(mime) => {
                write!(f, "Unsupported file type: {}", mime)
            }
            PipelineError::ExtractionFailed(e) => write!(f, "Text extraction failed: {}", e),
            PipelineError::ChunkerMisconfigured { window, overlap } => write!(
                f,
                "chunking window ({}) must be greater than overlap ({})",
                window, overlap
            ),
            PipelineError::EmbeddingFailed(e) => write!(f, "Embedding failed: {}", e),
            PipelineError::IndexUnavailable(e) => write!(f, "Vector index unavailable: {}", e),
            PipelineError::StorageUnavailable(e) => write!(f, "File storage unavailable: {}", e),
            PipelineError::StoreFailed(e) => write!(f, "Document store error: {}", e),
            PipelineError::NotFound(what) => write!(f, "Not found: {}", what),
            PipelineError::AlreadyProcessing(id) => {
                write!(f, "Document {} is already being processed", id)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ExtractError> for PipelineError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedContentType(mime) => {
                PipelineError::UnsupportedFileType(mime)
            }
            other => PipelineError::ExtractionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extract_error_maps_to_unsupported_file_type() {
        let err: PipelineError =
            ExtractError::UnsupportedContentType("application/zip".to_string()).into();
        assert!(matches!(err, PipelineError::UnsupportedFileType(_)));
        assert!(err.to_string().contains("application/zip"));
    }

    #[test]
    fn extract_failure_maps_to_extraction_failed() {
        let err: PipelineError = ExtractError::Pdf("bad xref".to_string()).into();
        assert!(matches!(err, PipelineError::ExtractionFailed(_)));
        assert!(err.to_string().contains("bad xref"));
    }
}
