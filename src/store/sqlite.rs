//! SQLite-backed [`DocumentStore`] implementation.
//!
//! One row per document in the `documents` table (see
//! [`migrate`](crate::migrate)). The processing claim is a conditional
//! `UPDATE … WHERE status != 'processing'`, which SQLite executes atomically,
//! so two concurrent runs on the same document cannot both win.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::error::PipelineError;
use crate::models::{DocumentRecord, ProcessingState, ProcessingStatus};

use super::DocumentStore;

/// Document store over a shared SQLite pool.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn store_err(e: sqlx::Error) -> PipelineError {
    PipelineError::StoreFailed(e.to_string())
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> DocumentRecord {
    let status_str: String = row.get("status");
    let state = ProcessingState::parse(&status_str).unwrap_or(ProcessingState::Pending);
    let completed: bool = row.get::<i64, _>("completed") != 0;

    DocumentRecord {
        id: row.get("id"),
        project_id: row.get("project_id"),
        organization_id: row.get("organization_id"),
        file_type: row.get("file_type"),
        file_path: row.get("file_path"),
        extracted_text: row.get("extracted_text"),
        processing: ProcessingStatus {
            state,
            completed,
            chunks_count: row.get("chunks_count"),
            error: row.get("error"),
        },
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert_document(&self, doc: &DocumentRecord) -> Result<(), PipelineError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, project_id, organization_id, file_type, file_path,
                 extracted_text, status, completed, chunks_count, error,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.project_id)
        .bind(&doc.organization_id)
        .bind(&doc.file_type)
        .bind(&doc.file_path)
        .bind(&doc.extracted_text)
        .bind(doc.processing.state.as_str())
        .bind(doc.processing.completed as i64)
        .bind(doc.processing.chunks_count)
        .bind(&doc.processing.error)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>, PipelineError> {
        let row = sqlx::query(
            "SELECT id, project_id, organization_id, file_type, file_path, extracted_text, status, completed, chunks_count, error FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.as_ref().map(row_to_record))
    }

    async fn claim_for_processing(&self, id: &str) -> Result<bool, PipelineError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = 'processing', completed = 0, chunks_count = NULL,
                error = NULL, updated_at = ?
            WHERE id = ? AND status != 'processing'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_extracted_text(&self, id: &str, text: &str) -> Result<(), PipelineError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query("UPDATE documents SET extracted_text = ?, updated_at = ? WHERE id = ?")
            .bind(text)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(PipelineError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    async fn set_status(&self, id: &str, status: &ProcessingStatus) -> Result<(), PipelineError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = ?, completed = ?, chunks_count = ?, error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.state.as_str())
        .bind(status.completed as i64)
        .bind(status.chunks_count)
        .bind(&status.error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(PipelineError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }
}
