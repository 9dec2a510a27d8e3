//! Mappings resolution.
//!
//! The archive's binary records carry no embedded type information; an
//! external schema overlay ("mappings") describes their field layouts.
//! Resolution walks an ordered provider chain:
//!
//! 1. Query the provider's descriptor endpoint.
//! 2. If the descriptor is well-formed (non-empty `fileName` and `url`),
//!    download and cache the schema file.
//! 3. First success wins; no further providers are tried and results are
//!    never merged.
//! 4. Any failure is logged with endpoint context and the next provider is
//!    tried.
//! 5. Exhausting the chain fails with [`NoSchemaAvailable`] carrying every
//!    attempt.
//!
//! The cache is keyed by file name: a present file is reused without a
//! freshness check. Fresh downloads go through a `.part` temp name and a
//! rename, so a crash mid-download can never be mistaken for a cache hit on
//! the next run. When a descriptor carries a 64-hex content hash, the
//! downloaded bytes are verified as SHA-256 before the rename; other hash
//! shapes are ignored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{NoSchemaAvailable, ProviderError};

/// One provider in the fallback chain.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    /// Short name used in logs and failure reports.
    pub name: String,

    /// Descriptor endpoint URL.
    pub url: String,
}

impl ProviderEndpoint {
    /// Create a provider entry.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Default provider chain, queried in priority order.
pub fn default_providers() -> Vec<ProviderEndpoint> {
    vec![
        ProviderEndpoint::new(
            "fortnite-central",
            "https://fortnitecentral.genxgames.gg/api/v1/mappings",
        ),
        ProviderEndpoint::new("fmodel", "https://api.fmodel.app/v1/mappings"),
    ]
}

/// One candidate schema file described by a provider.
///
/// Providers differ in descriptor shape; only `file_name` and `url` are
/// required to proceed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingsDescriptor {
    /// Cache key and on-disk file name.
    #[serde(default)]
    pub file_name: String,

    /// Where the schema file body is downloaded from.
    #[serde(default, alias = "sourceUrl")]
    pub url: String,

    /// Hex content hash, when the provider reports one.
    #[serde(default)]
    pub hash: Option<String>,

    /// Byte length, when reported.
    #[serde(default)]
    pub length: Option<u64>,

    /// Upload timestamp, when reported.
    #[serde(default)]
    pub uploaded: Option<DateTime<Utc>>,

    /// Provider-specific metadata.
    #[serde(default)]
    pub meta: Option<DescriptorMeta>,
}

/// Optional descriptor metadata block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorMeta {
    /// Schema version string.
    #[serde(default)]
    pub version: Option<String>,

    /// Compression method of the schema file.
    #[serde(default)]
    pub compression_method: Option<String>,

    /// Target platform.
    #[serde(default)]
    pub platform: Option<String>,
}

/// Handle to a locally cached schema file.
///
/// The archive's schema loader accepts the path and parses lazily on first
/// typed-field access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaHandle {
    path: PathBuf,
}

impl SchemaHandle {
    /// Wrap an already-local schema file, bypassing provider resolution.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Local path of the cached schema file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cache file name.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Resolves a schema overlay through the configured provider chain.
#[derive(Debug, Clone)]
pub struct MappingsResolver {
    client: reqwest::Client,
    providers: Vec<ProviderEndpoint>,
    data_dir: PathBuf,
}

impl MappingsResolver {
    /// Create a resolver over an ordered provider chain caching into
    /// `data_dir`.
    pub fn new(
        client: reqwest::Client,
        providers: Vec<ProviderEndpoint>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            providers,
            data_dir: data_dir.into(),
        }
    }

    /// Resolve a schema, trying providers strictly in priority order.
    pub async fn resolve(&self) -> Result<SchemaHandle, NoSchemaAvailable> {
        let mut attempts = Vec::new();
        for provider in &self.providers {
            match self.try_provider(provider).await {
                Ok(handle) => {
                    info!(
                        provider = %provider.name,
                        file = %handle.file_name(),
                        "mappings resolved"
                    );
                    return Ok(handle);
                }
                Err(err) => {
                    warn!(
                        provider = %provider.name,
                        url = %provider.url,
                        error = %err,
                        "mappings provider failed, trying next"
                    );
                    attempts.push((provider.name.clone(), err));
                }
            }
        }
        Err(NoSchemaAvailable { attempts })
    }

    async fn try_provider(&self, provider: &ProviderEndpoint) -> Result<SchemaHandle, ProviderError> {
        let response = self
            .client
            .get(&provider.url)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(|e| ProviderError::Network {
            message: e.to_string(),
        })?;

        let descriptor = descriptor_from_body(&body)?;
        self.download_and_cache(&descriptor).await
    }

    /// Download the described schema file into the cache, or reuse a cached
    /// copy with the same name.
    pub async fn download_and_cache(
        &self,
        descriptor: &MappingsDescriptor,
    ) -> Result<SchemaHandle, ProviderError> {
        let target = self.data_dir.join(&descriptor.file_name);
        if fs::try_exists(&target).await? {
            debug!(file = %descriptor.file_name, "schema cache hit");
            return Ok(SchemaHandle { path: target });
        }

        fs::create_dir_all(&self.data_dir).await?;

        info!(url = %descriptor.url, file = %descriptor.file_name, "downloading mappings");
        let response = self
            .client
            .get(&descriptor.url)
            .send()
            .await
            .map_err(|e| ProviderError::Download {
                url: descriptor.url.clone(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Download {
                url: descriptor.url.clone(),
                message: format!("status {status}"),
            });
        }
        let bytes = response.bytes().await.map_err(|e| ProviderError::Download {
            url: descriptor.url.clone(),
            message: e.to_string(),
        })?;

        if let Some(expected) = descriptor.hash.as_deref() {
            verify_content_hash(expected, &bytes)?;
        }

        // Write-then-rename: a leftover `.part` file is never a cache hit.
        let partial = self.data_dir.join(format!("{}.part", descriptor.file_name));
        fs::write(&partial, &bytes).await?;
        fs::rename(&partial, &target).await?;
        info!(file = %descriptor.file_name, bytes = bytes.len(), "mappings cached");
        Ok(SchemaHandle { path: target })
    }
}

/// Parse a descriptor endpoint body. Endpoints return either a single
/// descriptor object or a list; the first element is used.
fn descriptor_from_body(body: &str) -> Result<MappingsDescriptor, ProviderError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse {
            message: e.to_string(),
        })?;
    let candidate = match value {
        serde_json::Value::Array(mut items) => {
            if items.is_empty() {
                return Err(ProviderError::EmptyDescriptor);
            }
            items.remove(0)
        }
        other => other,
    };
    let descriptor: MappingsDescriptor =
        serde_json::from_value(candidate).map_err(|e| ProviderError::Parse {
            message: e.to_string(),
        })?;
    if descriptor.file_name.is_empty() || descriptor.url.is_empty() {
        return Err(ProviderError::EmptyDescriptor);
    }
    if descriptor.file_name.contains(['/', '\\']) || descriptor.file_name.contains("..") {
        return Err(ProviderError::Parse {
            message: format!("descriptor fileName escapes the cache: {}", descriptor.file_name),
        });
    }
    Ok(descriptor)
}

fn verify_content_hash(expected: &str, bytes: &[u8]) -> Result<(), ProviderError> {
    let expected = expected.trim().to_ascii_lowercase();
    if expected.len() != 64 || !expected.bytes().all(|b| b.is_ascii_hexdigit()) {
        debug!(hash = %expected, "unrecognized descriptor hash shape, skipping verification");
        return Ok(());
    }
    let digest = hex::encode(Sha256::digest(bytes));
    if digest != expected {
        return Err(ProviderError::HashMismatch { expected });
    }
    Ok(())
}
