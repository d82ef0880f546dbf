//! Document registration and inspection commands.
//!
//! `add` registers an uploaded file as a pending document record; `status`
//! and `get` read a record back. Used by the CLI; the HTTP server reads
//! through the same store.

use anyhow::Result;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::{DocumentRecord, ProcessingStatus};
use crate::store::sqlite::SqliteDocumentStore;
use crate::store::DocumentStore;

/// Register a new document record in `pending` state and print its id.
pub async fn run_add(
    config: &Config,
    project_id: &str,
    organization_id: &str,
    file_type: &str,
    file_path: &str,
    id: Option<String>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteDocumentStore::new(pool);

    let doc = DocumentRecord {
        id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        project_id: project_id.to_string(),
        organization_id: organization_id.to_string(),
        file_type: file_type.to_string(),
        file_path: file_path.to_string(),
        extracted_text: None,
        processing: ProcessingStatus::pending(),
    };
    store.insert_document(&doc).await?;

    println!("added document");
    println!("  id:        {}", doc.id);
    println!("  project:   {}", doc.project_id);
    println!("  file type: {}", doc.file_type);
    println!("  file path: {}", doc.file_path);
    Ok(())
}

/// Print a document's processing status.
pub async fn run_status(config: &Config, id: &str) -> Result<()> {
    let doc = fetch(config, id).await?;
    let status = &doc.processing;

    println!("document {}", doc.id);
    println!("  status:    {}", status.state.as_str());
    println!("  completed: {}", status.completed);
    if let Some(count) = status.chunks_count {
        println!("  chunks:    {}", count);
    }
    if let Some(ref error) = status.error {
        println!("  error:     {}", error);
    }
    Ok(())
}

/// Print a full document record, including extracted text.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let doc = fetch(config, id).await?;

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("project:      {}", doc.project_id);
    println!("organization: {}", doc.organization_id);
    println!("file type:    {}", doc.file_type);
    println!("file path:    {}", doc.file_path);
    println!("status:       {}", doc.processing.state.as_str());
    if let Some(count) = doc.processing.chunks_count {
        println!("chunks:       {}", count);
    }
    if let Some(ref error) = doc.processing.error {
        println!("error:        {}", error);
    }
    println!();

    match doc.extracted_text {
        Some(ref text) => {
            println!("--- Extracted text ---");
            println!("{}", text);
        }
        None => println!("(no extracted text)"),
    }
    Ok(())
}

async fn fetch(config: &Config, id: &str) -> Result<DocumentRecord> {
    let pool = db::connect(config).await?;
    let store = SqliteDocumentStore::new(pool);
    match store.get_document(id).await? {
        Some(doc) => Ok(doc),
        None => {
            eprintln!("Error: document not found: {}", id);
            std::process::exit(1);
        }
    }
}
