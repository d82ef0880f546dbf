//! Fixed-size sliding-window text chunker.
//!
//! Splits extracted document text into overlapping windows of a configurable
//! character size. Each kept chunk receives a zero-based index; the index is
//! part of the chunk's deterministic vector key, which makes re-ingestion
//! overwrite rather than duplicate.
//!
//! For text of L characters, window W and overlap O (O < W), windows start at
//! `0, W-O, 2(W-O), …`, giving `ceil((L-O)/(W-O))` slices; slices that are
//! empty after trimming (trailing whitespace-only input) are discarded. A
//! window whose characters all lie inside the previous window's overlap would
//! duplicate content already emitted, so the sequence stops before it.

use crate::error::PipelineError;
use crate::models::{DocumentChunk, DocumentRecord};

/// Default window size in characters.
pub const DEFAULT_WINDOW_CHARS: usize = 1000;
/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// Deterministic vector-index key for a chunk: `{documentId}-chunk-{index}`.
pub fn chunk_key(document_id: &str, index: usize) -> String {
    format!("{}-chunk-{}", document_id, index)
}

/// Split a document's extracted text into overlapping chunks.
///
/// Windows are measured in Unicode scalar values, never splitting a code
/// point. Empty text yields an empty vector — a defined outcome, not an
/// error; the document then completes with a chunk count of zero.
///
/// # Errors
///
/// Returns [`PipelineError::ChunkerMisconfigured`] when `window == 0` or
/// `overlap >= window` (the advance step would be non-positive). Config
/// loading rejects this before any document is processed; the check here
/// guards hand-built configurations.
pub fn split_document(
    doc: &DocumentRecord,
    text: &str,
    window: usize,
    overlap: usize,
) -> Result<Vec<DocumentChunk>, PipelineError> {
    if window == 0 || overlap >= window {
        return Err(PipelineError::ChunkerMisconfigured { window, overlap });
    }

    // Byte offset of every char boundary, so windows can be sliced without
    // landing inside a multi-byte code point.
    let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = boundaries.len();

    let mut chunks = Vec::new();
    let step = window - overlap;
    let mut start = 0usize;

    // A window past the first must reach beyond the previous window's
    // overlap region (start + overlap < L) to contribute new characters.
    while start < char_len && (start == 0 || start + overlap < char_len) {
        let end = (start + window).min(char_len);
        let byte_start = boundaries[start];
        let byte_end = if end == char_len {
            text.len()
        } else {
            boundaries[end]
        };
        let slice = &text[byte_start..byte_end];

        if !slice.trim().is_empty() {
            chunks.push(DocumentChunk {
                document_id: doc.id.clone(),
                project_id: doc.project_id.clone(),
                organization_id: doc.organization_id.clone(),
                index: chunks.len(),
                text: slice.to_string(),
            });
        }

        start += step;
    }

    Ok(chunks)
}
