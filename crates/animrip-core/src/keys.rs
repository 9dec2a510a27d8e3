//! Key registry client.
//!
//! Fetches the archive decryption keys from a remote key-distribution
//! endpoint and normalizes them into a [`KeySet`]: exactly one primary key
//! (the zero-GUID entry) plus zero or more dynamic keys scoped to encrypted
//! chunk groups.
//!
//! Policy: a dynamic entry with a malformed GUID or malformed key material
//! invalidates only that entry. The fetch as a whole succeeds as long as the
//! primary key parses. A missing or unparsable primary aborts the fetch with
//! [`KeyFetchError::MissingPrimary`].

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::KeyFetchError;

/// Default key-distribution endpoint. Any schema-compatible endpoint may be
/// substituted via [`crate::config::SessionConfig`].
pub const DEFAULT_KEY_ENDPOINT: &str = "https://fortnitecentral.genxgames.gg/api/v1/aes";

/// Length of raw AES key material in bytes.
pub const AES_KEY_LEN: usize = 32;

/// Fixed-length decryption key material.
#[derive(Clone, PartialEq, Eq)]
pub struct AesKey([u8; AES_KEY_LEN]);

impl AesKey {
    /// Parse key material from a hex string, with or without a `0x` prefix.
    pub fn parse_hex(input: &str) -> Result<Self, InvalidKey> {
        let trimmed = input.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(hex_part).map_err(|e| InvalidKey {
            reason: format!("bad hex: {e}"),
        })?;
        let material: [u8; AES_KEY_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| InvalidKey {
            reason: format!("expected {AES_KEY_LEN} bytes, got {}", bytes.len()),
        })?;
        Ok(Self(material))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; AES_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for AesKey {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AesKey(..)")
    }
}

/// Rejected key material.
#[derive(Debug, thiserror::Error)]
#[error("invalid key material: {reason}")]
pub struct InvalidKey {
    reason: String,
}

/// Key service response body.
#[derive(Debug, Deserialize)]
pub struct KeyServiceResponse {
    /// Build version the keys apply to, when the service reports one.
    #[serde(default)]
    pub version: Option<String>,

    /// Hex-encoded primary key.
    #[serde(rename = "mainKey")]
    pub main_key: Option<String>,

    /// Keys scoped to encrypted chunk groups.
    #[serde(rename = "dynamicKeys", default)]
    pub dynamic_keys: Vec<DynamicKeyEntry>,
}

/// One dynamic key as reported by the service.
#[derive(Debug, Deserialize)]
pub struct DynamicKeyEntry {
    /// Human-readable name of the chunk group (informational).
    #[serde(default)]
    pub name: Option<String>,

    /// Chunk group GUID in the service's textual form.
    pub guid: String,

    /// Hex-encoded key.
    pub key: String,
}

/// Normalized, write-once key set for one session.
///
/// The primary key is the zero-GUID entry; [`KeySet::key_for_group`] with
/// [`Uuid::nil`] returns it. A group GUID with no matching dynamic key is a
/// partial-capability state, not an error: the corresponding chunk group is
/// simply unreadable.
#[derive(Debug, Clone)]
pub struct KeySet {
    primary: AesKey,
    dynamic: HashMap<Uuid, AesKey>,
}

impl KeySet {
    /// Build a key set from a parsed service response.
    ///
    /// Fails only when the primary key is absent or unparsable; malformed
    /// dynamic entries are skipped with a warning.
    pub fn from_response(response: &KeyServiceResponse) -> Result<Self, KeyFetchError> {
        let main_key = response
            .main_key
            .as_deref()
            .ok_or_else(|| KeyFetchError::MissingPrimary {
                message: "mainKey field absent".to_string(),
            })?;
        let primary =
            AesKey::parse_hex(main_key).map_err(|e| KeyFetchError::MissingPrimary {
                message: e.to_string(),
            })?;

        let mut dynamic = HashMap::with_capacity(response.dynamic_keys.len());
        for entry in &response.dynamic_keys {
            let group = match parse_group_guid(&entry.guid) {
                Ok(group) => group,
                Err(reason) => {
                    warn!(
                        guid = %entry.guid,
                        name = entry.name.as_deref().unwrap_or("<unnamed>"),
                        reason,
                        "skipping dynamic key with malformed guid"
                    );
                    continue;
                }
            };
            let key = match AesKey::parse_hex(&entry.key) {
                Ok(key) => key,
                Err(err) => {
                    warn!(
                        guid = %entry.guid,
                        error = %err,
                        "skipping dynamic key with malformed key material"
                    );
                    continue;
                }
            };
            dynamic.insert(group, key);
        }

        Ok(Self { primary, dynamic })
    }

    /// Build a key set directly from parsed material. Mostly useful in tests
    /// and fixtures.
    pub fn from_parts(primary: AesKey, dynamic: HashMap<Uuid, AesKey>) -> Self {
        Self { primary, dynamic }
    }

    /// The zero-GUID primary key.
    pub fn primary(&self) -> &AesKey {
        &self.primary
    }

    /// Key for a chunk group. The nil GUID addresses the primary key.
    pub fn key_for_group(&self, group: Uuid) -> Option<&AesKey> {
        if group.is_nil() {
            Some(&self.primary)
        } else {
            self.dynamic.get(&group)
        }
    }

    /// Whether a dynamic key exists for the given chunk group.
    pub fn has_group(&self, group: Uuid) -> bool {
        group.is_nil() || self.dynamic.contains_key(&group)
    }

    /// Number of dynamic keys.
    pub fn dynamic_count(&self) -> usize {
        self.dynamic.len()
    }

    /// Total number of keys including the primary.
    pub fn len(&self) -> usize {
        1 + self.dynamic.len()
    }

    /// A key set always holds at least the primary key.
    pub fn is_empty(&self) -> bool {
        false
    }
}

fn parse_group_guid(input: &str) -> Result<Uuid, &'static str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty guid");
    }
    Uuid::parse_str(trimmed).map_err(|_| "not a parsable guid")
}

/// Client for the remote key-distribution endpoint.
///
/// Issues a single GET per [`KeyClient::fetch_keys`] call and never retries
/// internally; the caller decides whether to retry the whole bootstrap.
#[derive(Debug, Clone)]
pub struct KeyClient {
    client: reqwest::Client,
    endpoint: String,
}

impl KeyClient {
    /// Create a client against the given endpoint.
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Fetch and normalize the session key set.
    pub async fn fetch_keys(&self) -> Result<KeySet, KeyFetchError> {
        debug!(endpoint = %self.endpoint, "fetching decryption keys");

        let response = self.client.get(&self.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body: KeyServiceResponse =
            response.json().await.map_err(|e| KeyFetchError::Parse {
                message: e.to_string(),
            })?;

        let keys = KeySet::from_response(&body)?;
        info!(
            build = body.version.as_deref().unwrap_or("unknown"),
            dynamic = keys.dynamic_count(),
            "key set fetched"
        );
        Ok(keys)
    }
}
