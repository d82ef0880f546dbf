use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where document bytes live. `filesystem` resolves `file_path` under a local
/// root; `s3` fetches it as an object key from an S3-compatible bucket.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_provider")]
    pub provider: String,
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_storage_provider() -> String {
    "filesystem".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_window_chars() -> usize {
    chunk::DEFAULT_WINDOW_CHARS
}
fn default_overlap_chars() -> usize {
    chunk::DEFAULT_OVERLAP_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Extraction of a single document is abandoned after this many seconds.
    #[serde(default = "default_extract_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extract_timeout_secs(),
        }
    }
}

fn default_extract_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `memory` (single-process, tests and serve) or `pinecone` (REST).
    #[serde(default = "default_index_provider")]
    pub provider: String,
    /// Index host URL for the REST provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_index_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            url: None,
            namespace: None,
            timeout_secs: default_index_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "memory".to_string()
}
fn default_index_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Nearest chunks fetched per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_model")]
    pub model: String,
    #[serde(default = "default_answer_temperature")]
    pub temperature: f32,
    /// Document text handed to summarization is capped at this many chars.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_answer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            model: default_answer_model(),
            temperature: default_answer_temperature(),
            max_context_chars: default_max_context_chars(),
            timeout_secs: default_answer_timeout_secs(),
        }
    }
}

fn default_answer_model() -> String {
    "gpt-4-turbo".to_string()
}
fn default_answer_temperature() -> f32 {
    0.3
}
fn default_max_context_chars() -> usize {
    15_000
}
fn default_answer_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// When set, every request must carry `Authorization: Bearer <token>`.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            auth_token: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7431".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking — window <= overlap would never advance, so it is a
    // startup error, not a per-document runtime error.
    if config.chunking.window_chars == 0 {
        anyhow::bail!("chunking.window_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.window_chars {
        anyhow::bail!(
            "chunking.window_chars ({}) must be greater than chunking.overlap_chars ({})",
            config.chunking.window_chars,
            config.chunking.overlap_chars
        );
    }

    // Validate storage
    match config.storage.provider.as_str() {
        "filesystem" => {
            if config.storage.root.is_none() {
                anyhow::bail!("storage.root must be set when storage.provider is 'filesystem'");
            }
        }
        "s3" => {
            if config.storage.bucket.is_none() {
                anyhow::bail!("storage.bucket must be set when storage.provider is 's3'");
            }
            if config.storage.region.is_none() {
                anyhow::bail!("storage.region must be set when storage.provider is 's3'");
            }
        }
        other => anyhow::bail!(
            "Unknown storage provider: '{}'. Must be filesystem or s3.",
            other
        ),
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate index
    match config.index.provider.as_str() {
        "memory" => {}
        "pinecone" => {
            if config.index.url.is_none() {
                anyhow::bail!("index.url must be set when index.provider is 'pinecone'");
            }
        }
        other => anyhow::bail!(
            "Unknown index provider: '{}'. Must be memory or pinecone.",
            other
        ),
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let f = write_config(
            r#"
[db]
path = "data/docpipe.sqlite"

[storage]
provider = "filesystem"
root = "files"
"#,
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.chunking.window_chars, 1000);
        assert_eq!(cfg.chunking.overlap_chars, 200);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.index.provider, "memory");
        assert!(!cfg.embedding.is_enabled());
    }

    #[test]
    fn overlap_at_or_above_window_is_a_startup_error() {
        let f = write_config(
            r#"
[db]
path = "data/docpipe.sqlite"

[storage]
provider = "filesystem"
root = "files"

[chunking]
window_chars = 200
overlap_chars = 200
"#,
        );
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn enabled_embedding_requires_model_and_dims() {
        let f = write_config(
            r#"
[db]
path = "data/docpipe.sqlite"

[storage]
provider = "filesystem"
root = "files"

[embedding]
provider = "openai"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn pinecone_index_requires_url() {
        let f = write_config(
            r#"
[db]
path = "data/docpipe.sqlite"

[storage]
provider = "filesystem"
root = "files"

[index]
provider = "pinecone"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }
}
