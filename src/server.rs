//! HTTP trigger surface for the ingestion pipeline.
//!
//! Exposes the on-demand flows as a JSON API: manual (re)processing, status
//! reads, project-scoped question answering, and document summarization.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version; no auth) |
//! | `POST` | `/documents/{id}/process` | Run the ingestion pipeline for a document |
//! | `GET`  | `/documents/{id}/status` | Read a document's processing status |
//! | `POST` | `/query` | Answer a question from a project's documents |
//! | `POST` | `/documents/{id}/summarize` | Summarize a processed document |
//!
//! # Authentication
//!
//! When `[server].auth_token` is set, every endpoint except `/health`
//! requires `Authorization: Bearer <token>`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document abc not found" } }
//! ```
//!
//! Error codes: `unauthorized` (401), `bad_request` (400), `not_found` (404),
//! `conflict` (409), `processing_failed` (500), `internal` (500).

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::{self, ChatModel, SummaryLength};
use crate::pipeline::Pipeline;
use crate::query;
use crate::store::DocumentStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pipeline: Arc<Pipeline>,
    /// Absent when no chat credentials are configured; `/query` and
    /// `/summarize` then return a descriptive error.
    chat: Option<Arc<dyn ChatModel>>,
}

/// Start the HTTP server.
///
/// Binds to `[server].bind` and runs until the process is terminated. All
/// collaborators (document store, blob store, embedder, index, chat client)
/// are constructed once here and shared across requests.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pipeline = Arc::new(Pipeline::from_config(config).await?);

    let chat = match llm::create_chat_model(&config.answer) {
        Ok(chat) => Some(chat),
        Err(e) => {
            eprintln!("Warning: answer generation disabled: {}", e);
            None
        }
    };

    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline,
        chat,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/documents/{id}/process", post(handle_process))
        .route("/documents/{id}/status", get(handle_status))
        .route("/documents/{id}/summarize", post(handle_summarize))
        .route("/query", post(handle_query))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .route("/health", get(handle_health))
        .merge(protected)
        .layer(cors)
        .with_state(state);

    println!("docpipe server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Auth ============

async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(ref expected) = state.config.server.auth_token {
        let header = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let token = header.strip_prefix("Bearer ").unwrap_or("");
        if token != expected {
            return Err(AppError {
                status: StatusCode::UNAUTHORIZED,
                code: "unauthorized".to_string(),
                message: "Missing or invalid token".to_string(),
            });
        }
    }
    Ok(next.run(request).await)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map pipeline errors onto HTTP statuses. Stage failures are reported as
/// `processing_failed`; the document record already carries the same message
/// in its `failed` status.
fn classify_pipeline_error(err: PipelineError) -> AppError {
    match err {
        PipelineError::NotFound(what) => AppError {
            status: StatusCode::NOT_FOUND,
            code: "not_found".to_string(),
            message: format!("{} not found", what),
        },
        PipelineError::AlreadyProcessing(id) => AppError {
            status: StatusCode::CONFLICT,
            code: "conflict".to_string(),
            message: format!("document {} is already being processed", id),
        },
        other => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "processing_failed".to_string(),
            message: other.to_string(),
        },
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    success: bool,
    chunks_count: usize,
}

async fn handle_process(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessResponse>, AppError> {
    let outcome = state
        .pipeline
        .process_document(&id)
        .await
        .map_err(classify_pipeline_error)?;

    Ok(Json(ProcessResponse {
        success: true,
        chunks_count: outcome.chunks_count,
    }))
}

async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let doc = state
        .pipeline
        .store()
        .get_document(&id)
        .await
        .map_err(classify_pipeline_error)?
        .ok_or_else(|| classify_pipeline_error(PipelineError::NotFound(format!("document {}", id))))?;

    Ok(Json(doc.processing).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    question: String,
    project_id: String,
    max_results: Option<usize>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, AppError> {
    if request.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    if request.project_id.trim().is_empty() {
        return Err(bad_request("projectId must not be empty"));
    }
    let chat = state
        .chat
        .as_ref()
        .ok_or_else(|| bad_request("answer generation is not configured"))?;

    let top_k = request
        .max_results
        .unwrap_or(state.config.retrieval.top_k);

    let answer = query::answer_question(
        state.pipeline.embedder().as_ref(),
        state.pipeline.index().as_ref(),
        chat.as_ref(),
        &request.question,
        &request.project_id,
        top_k,
    )
    .await
    .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(answer).into_response())
}

#[derive(Deserialize)]
struct SummarizeRequest {
    #[serde(default)]
    length: Option<String>,
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
}

async fn handle_summarize(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError> {
    let length_str = request.length.as_deref().unwrap_or("medium");
    let length = SummaryLength::parse(length_str)
        .ok_or_else(|| bad_request(format!("unknown summary length: {}", length_str)))?;

    let chat = state
        .chat
        .as_ref()
        .ok_or_else(|| bad_request("answer generation is not configured"))?;

    let doc = state
        .pipeline
        .store()
        .get_document(&id)
        .await
        .map_err(classify_pipeline_error)?
        .ok_or_else(|| classify_pipeline_error(PipelineError::NotFound(format!("document {}", id))))?;

    let summary = llm::summarize_document(
        chat.as_ref(),
        &doc,
        length,
        state.config.answer.max_context_chars,
    )
    .await
    .map_err(|e| {
        if e.to_string().contains("extraction") {
            bad_request(e.to_string())
        } else {
            internal_error(e.to_string())
        }
    })?;

    Ok(Json(SummarizeResponse { summary }))
}
