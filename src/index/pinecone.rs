//! Pinecone-backed [`VectorIndex`] implementation.
//!
//! Talks to a Pinecone index host over its REST API (`/vectors/upsert`,
//! `/query`, `/vectors/delete`). The API key is read from the
//! `PINECONE_API_KEY` environment variable; the index host URL and optional
//! namespace come from `[index]` config.
//!
//! Chunk metadata is stored under the index's native field names
//! (`documentId`, `projectId`, `organizationId`, `chunk_index`, `text`), and
//! queries filter on `projectId` server-side so scoping holds even when the
//! caller's top-k is large.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::IndexConfig;
use crate::error::PipelineError;

use super::{IndexEntry, QueryMatch, VectorIndex};

/// REST client for one Pinecone index.
pub struct PineconeIndex {
    host: String,
    namespace: Option<String>,
    api_key: String,
    client: reqwest::Client,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let host = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("index.url required for Pinecone provider"))?;
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            api_key,
            client,
        })
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, PipelineError> {
        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::IndexUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::IndexUnavailable(format!(
                "Pinecone API error {}: {}",
                status, body_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::IndexUnavailable(e.to_string()))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), PipelineError> {
        if entries.is_empty() {
            return Ok(());
        }
        let vectors: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.key,
                    "values": e.vector,
                    "metadata": {
                        "documentId": e.chunk.document_id,
                        "projectId": e.chunk.project_id,
                        "organizationId": e.chunk.organization_id,
                        "chunk_index": e.chunk.index,
                        "text": e.chunk.text,
                    },
                })
            })
            .collect();

        let mut body = serde_json::json!({ "vectors": vectors });
        if let Some(ref ns) = self.namespace {
            body["namespace"] = serde_json::json!(ns);
        }
        self.post("/vectors/upsert", &body).await?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), PipelineError> {
        let mut body = serde_json::json!({
            "filter": { "documentId": { "$eq": document_id } },
        });
        if let Some(ref ns) = self.namespace {
            body["namespace"] = serde_json::json!(ns);
        }
        self.post("/vectors/delete", &body).await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        project_id: &str,
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, PipelineError> {
        let mut body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "filter": { "projectId": { "$eq": project_id } },
            "includeMetadata": true,
        });
        if let Some(ref ns) = self.namespace {
            body["namespace"] = serde_json::json!(ns);
        }

        let json = self.post("/query", &body).await?;
        parse_query_response(&json)
    }
}

/// Parse a Pinecone query response: `matches[].{score, metadata}`.
fn parse_query_response(json: &serde_json::Value) -> Result<Vec<QueryMatch>, PipelineError> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| {
            PipelineError::IndexUnavailable("invalid response: missing matches array".to_string())
        })?;

    let mut results = Vec::with_capacity(matches.len());
    for entry in matches {
        let metadata = entry.get("metadata").and_then(|m| m.as_object());
        let get_str = |key: &str| -> String {
            metadata
                .and_then(|m| m.get(key))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        results.push(QueryMatch {
            document_id: get_str("documentId"),
            project_id: get_str("projectId"),
            organization_id: get_str("organizationId"),
            chunk_index: metadata
                .and_then(|m| m.get("chunk_index"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
            text: get_str("text"),
            score: entry
                .get("score")
                .and_then(|s| s.as_f64())
                .unwrap_or(0.0) as f32,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_response_reads_metadata() {
        let json = serde_json::json!({
            "matches": [
                {
                    "id": "doc-1-chunk-0",
                    "score": 0.92,
                    "metadata": {
                        "documentId": "doc-1",
                        "projectId": "proj-a",
                        "organizationId": "org-1",
                        "chunk_index": 0,
                        "text": "chunk text",
                    }
                }
            ]
        });
        let matches = parse_query_response(&json).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].document_id, "doc-1");
        assert_eq!(matches[0].project_id, "proj-a");
        assert_eq!(matches[0].chunk_index, 0);
        assert!((matches[0].score - 0.92).abs() < 1e-6);
    }

    #[test]
    fn parse_query_response_requires_matches_array() {
        let json = serde_json::json!({ "results": [] });
        assert!(parse_query_response(&json).is_err());
    }
}
