//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API.
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are not
//!   configured.
//!
//! A single provider instance serves both ingestion and query embedding, so
//! chunk vectors and query vectors always come from the same named model and
//! stay comparable.
//!
//! Failures are not retried here: a failed run is re-driven by reprocessing
//! the whole document, never by resuming mid-pipeline.
//!
//! Also provides [`cosine_similarity`] for the in-memory vector index.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// Trait for embedding providers.
///
/// `embed` maps each input text to a fixed-length vector, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-large"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `3072`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embed a single text (chunk during ingestion, question during query).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(PipelineError::EmbeddingFailed(
                "empty embedding response".to_string(),
            ));
        }
        Ok(vectors.remove(0))
    }
}

/// Create the appropriate [`Embedder`] from configuration.
///
/// Unknown providers and missing settings are startup errors, not
/// per-document runtime errors.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Err(PipelineError::EmbeddingFailed(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable. Each call carries the configured
/// timeout; a non-success response or network error fails the current run.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::EmbeddingFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::EmbeddingFailed(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::EmbeddingFailed(e.to_string()))?;
        parse_embeddings_response(&json, texts.len())
    }
}

/// Parse the OpenAI embeddings response: `data[].embedding` arrays in input
/// order.
fn parse_embeddings_response(
    json: &serde_json::Value,
    expected: usize,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            PipelineError::EmbeddingFailed("invalid response: missing data array".to_string())
        })?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                PipelineError::EmbeddingFailed("invalid response: missing embedding".to_string())
            })?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }

    if embeddings.len() != expected {
        return Err(PipelineError::EmbeddingFailed(format!(
            "expected {} embeddings, got {}",
            expected,
            embeddings.len()
        )));
    }
    Ok(embeddings)
}

// ============ Vector utilities ============

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn parse_response_in_order() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [1.0, 0.0] },
                { "embedding": [0.0, 1.0] },
            ]
        });
        let vectors = parse_embeddings_response(&json, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn parse_response_rejects_count_mismatch() {
        let json = serde_json::json!({ "data": [{ "embedding": [1.0] }] });
        assert!(parse_embeddings_response(&json, 2).is_err());
    }

    #[tokio::test]
    async fn disabled_provider_always_errors() {
        let err = DisabledEmbedder
            .embed(&["hello".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingFailed(_)));
    }
}
