//! File storage abstraction — the byte-fetch collaborator.
//!
//! A document record carries an opaque `file_path` locator; the
//! [`BlobStore`] turns it into raw bytes. Implementations:
//! - **[`FsBlobStore`]** — resolves the locator under a local root directory.
//! - **[`S3BlobStore`]** — fetches the locator as an object key from an
//!   S3-compatible bucket, signing requests with AWS Signature V4 using only
//!   pure-Rust dependencies (`hmac`, `sha2`, `hex`). Credentials come from
//!   `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (and optionally
//!   `AWS_SESSION_TOKEN`); custom endpoints support MinIO and LocalStack.
//! - **[`MemoryBlobStore`]** — in-process map for tests.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::StorageConfig;
use crate::error::PipelineError;

type HmacSha256 = Hmac<Sha256>;

/// Byte-fetch capability over an opaque storage locator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the raw bytes stored at `path`.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Create the appropriate [`BlobStore`] from configuration.
pub fn create_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.provider.as_str() {
        "filesystem" => {
            let root = config
                .root
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage.root required for filesystem provider"))?;
            Ok(Arc::new(FsBlobStore::new(root)))
        }
        "s3" => {
            let bucket = config
                .bucket
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage.bucket required for s3 provider"))?;
            let region = config
                .region
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage.region required for s3 provider"))?;
            Ok(Arc::new(S3BlobStore::new(
                bucket,
                region,
                config.endpoint_url.clone(),
            )?))
        }
        other => bail!("Unknown storage provider: {}", other),
    }
}

// ============ Filesystem ============

/// Blob store over a local directory root.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        let relative = Path::new(path);
        // Locators are relative keys; refuse anything escaping the root.
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(PipelineError::StorageUnavailable(format!(
                "invalid storage path: {}",
                path
            )));
        }

        tokio::fs::read(self.root.join(relative))
            .await
            .map_err(|e| PipelineError::StorageUnavailable(format!("{}: {}", path, e)))
    }
}

// ============ In-memory (tests) ============

/// In-memory blob store for tests.
pub struct MemoryBlobStore {
    blobs: std::sync::RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: std::sync::RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, path: &str, bytes: Vec<u8>) {
        self.blobs.write().unwrap().insert(path.to_string(), bytes);
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        self.blobs
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| PipelineError::StorageUnavailable(format!("no blob at {}", path)))
    }
}

// ============ S3 ============

/// AWS credentials loaded from environment variables.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| anyhow::anyhow!("AWS_ACCESS_KEY_ID environment variable not set"))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| anyhow::anyhow!("AWS_SECRET_ACCESS_KEY environment variable not set"))?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// Blob store over an S3-compatible bucket, using signed single-object GETs.
pub struct S3BlobStore {
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3BlobStore {
    pub fn new(bucket: String, region: String, endpoint_url: Option<String>) -> Result<Self> {
        Ok(Self {
            bucket,
            region,
            endpoint_url,
            creds: AwsCredentials::from_env()?,
            client: reqwest::Client::new(),
        })
    }

    fn host(&self) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        } else {
            format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        let host = self.host();
        let encoded_key = path
            .split('/')
            .map(uri_encode)
            .collect::<Vec<_>>()
            .join("/");
        let url = format!("https://{}/{}", host, encoded_key);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let payload_hash = hex_sha256(b"");

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_uri = format!("/{}", encoded_key);
        let canonical_request = format!(
            "GET\n{}\n\n{}\n{}\n{}",
            canonical_uri, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            &self.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut req_builder = self
            .client
            .get(&url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);
        if let Some(ref token) = self.creds.session_token {
            req_builder = req_builder.header("x-amz-security-token", token);
        }

        let resp = req_builder.send().await.map_err(|e| {
            PipelineError::StorageUnavailable(format!(
                "s3://{}/{}: {}",
                self.bucket, path, e
            ))
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::StorageUnavailable(format!(
                "S3 GetObject failed (HTTP {}) for key '{}'",
                status, path
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::StorageUnavailable(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ============ AWS SigV4 Helpers ============

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute hex-encoded HMAC-SHA256.
fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986 (used in SigV4 canonical requests).
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
