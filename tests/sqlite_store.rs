//! SQLite document-store tests against a temporary database.

use std::path::PathBuf;

use docpipe::config::{
    AnswerConfig, ChunkingConfig, Config, DbConfig, EmbeddingConfig, ExtractionConfig,
    IndexConfig, RetrievalConfig, ServerConfig, StorageConfig,
};
use docpipe::db;
use docpipe::migrate;
use docpipe::models::{DocumentRecord, ProcessingState, ProcessingStatus};
use docpipe::store::sqlite::SqliteDocumentStore;
use docpipe::store::DocumentStore;
use tempfile::TempDir;

fn config_for(tmp: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: tmp.path().join("data").join("docpipe.sqlite"),
        },
        storage: StorageConfig {
            provider: "filesystem".to_string(),
            root: Some(PathBuf::from("unused")),
            bucket: None,
            region: None,
            endpoint_url: None,
        },
        chunking: ChunkingConfig {
            window_chars: 1000,
            overlap_chars: 200,
        },
        extraction: ExtractionConfig::default(),
        embedding: EmbeddingConfig::default(),
        index: IndexConfig::default(),
        retrieval: RetrievalConfig::default(),
        answer: AnswerConfig::default(),
        server: ServerConfig::default(),
    }
}

async fn store_for(config: &Config) -> SqliteDocumentStore {
    migrate::run_migrations(config).await.unwrap();
    let pool = db::connect(config).await.unwrap();
    SqliteDocumentStore::new(pool)
}

fn document(id: &str) -> DocumentRecord {
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
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&tmp);
    migrate::run_migrations(&config).await.unwrap();
    migrate::run_migrations(&config).await.unwrap();
}

#[tokio::test]
async fn insert_and_get_round_trip() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&tmp);
    let store = store_for(&config).await;

    store.insert_document(&document("d1")).await.unwrap();
    let got = store.get_document("d1").await.unwrap().unwrap();

    assert_eq!(got.id, "d1");
    assert_eq!(got.project_id, "proj-1");
    assert_eq!(got.organization_id, "org-1");
    assert_eq!(got.file_type, "application/pdf");
    assert_eq!(got.file_path, "uploads/d1.pdf");
    assert!(got.extracted_text.is_none());
    assert_eq!(got.processing.state, ProcessingState::Pending);
    assert!(!got.processing.completed);

    assert!(store.get_document("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn claim_is_conditional_on_status() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&tmp);
    let store = store_for(&config).await;
    store.insert_document(&document("d1")).await.unwrap();

    assert!(store.claim_for_processing("d1").await.unwrap());
    let claimed = store.get_document("d1").await.unwrap().unwrap();
    assert_eq!(claimed.processing.state, ProcessingState::Processing);

    // Second claim loses while the first run is in flight.
    assert!(!store.claim_for_processing("d1").await.unwrap());

    // Terminal states can be reclaimed for reprocessing.
    store
        .set_status("d1", &ProcessingStatus::completed(4))
        .await
        .unwrap();
    assert!(store.claim_for_processing("d1").await.unwrap());

    // Claiming clears stale completion fields.
    let reclaimed = store.get_document("d1").await.unwrap().unwrap();
    assert_eq!(reclaimed.processing.state, ProcessingState::Processing);
    assert!(reclaimed.processing.chunks_count.is_none());
    assert!(reclaimed.processing.error.is_none());

    assert!(!store.claim_for_processing("missing").await.unwrap());
}

#[tokio::test]
async fn status_and_text_updates_persist() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&tmp);
    let store = store_for(&config).await;
    store.insert_document(&document("d1")).await.unwrap();

    store
        .set_extracted_text("d1", "extracted body")
        .await
        .unwrap();
    store
        .set_status("d1", &ProcessingStatus::completed(2))
        .await
        .unwrap();

    let got = store.get_document("d1").await.unwrap().unwrap();
    assert_eq!(got.extracted_text.as_deref(), Some("extracted body"));
    assert_eq!(got.processing.state, ProcessingState::Completed);
    assert!(got.processing.completed);
    assert_eq!(got.processing.chunks_count, Some(2));

    store
        .set_status("d1", &ProcessingStatus::failed("index down"))
        .await
        .unwrap();
    let failed = store.get_document("d1").await.unwrap().unwrap();
    assert_eq!(failed.processing.state, ProcessingState::Failed);
    assert_eq!(failed.processing.error.as_deref(), Some("index down"));
    assert!(failed.processing.chunks_count.is_none());

    assert!(store.set_extracted_text("missing", "x").await.is_err());
    assert!(store
        .set_status("missing", &ProcessingStatus::failed("x"))
        .await
        .is_err());
}
