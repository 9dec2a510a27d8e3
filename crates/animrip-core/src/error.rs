//! Error taxonomy for the bootstrap pipeline and export cycles.
//!
//! Startup errors (`KeyFetchError`, `BootstrapError`, `NoSchemaAvailable`,
//! `ArchiveOpenError`) are fatal to the session and surface through
//! [`SessionError`]. Errors raised inside a single export cycle
//! ([`LoadError`], [`ExportError`]) are local: the session stays usable for
//! the next cycle.

use std::path::PathBuf;

use uuid::Uuid;

/// Failures fetching or parsing the key service response.
#[derive(Debug, thiserror::Error)]
pub enum KeyFetchError {
    /// Key endpoint unreachable.
    #[error("key endpoint unreachable: {message}")]
    Network { message: String },

    /// Key endpoint answered with a non-2xx status.
    #[error("key endpoint {endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// Response body is not valid key-service JSON.
    #[error("key response could not be parsed: {message}")]
    Parse { message: String },

    /// Response parsed but no usable primary key was present.
    #[error("key response has no usable primary key: {message}")]
    MissingPrimary { message: String },
}

impl From<reqwest::Error> for KeyFetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Failures staging or loading the native decompression helper.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Helper download failed (network or non-2xx status).
    #[error("decompressor download from {url} failed: {message}")]
    Download { url: String, message: String },

    /// Filesystem error while staging the helper.
    #[error("failed to stage decompressor helper: {0}")]
    Io(#[from] std::io::Error),

    /// The staged helper loaded but reported an incompatible version.
    #[error("decompressor at {path} is incompatible: {message}")]
    IncompatibleHelper { path: PathBuf, message: String },
}

/// Failure of a single mappings provider. One of these per provider is
/// collected into [`NoSchemaAvailable`] when the whole chain is exhausted.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider endpoint unreachable.
    #[error("provider unreachable: {message}")]
    Network { message: String },

    /// Provider answered with a non-2xx status.
    #[error("provider returned status {status}")]
    Status { status: u16 },

    /// Descriptor body is not valid JSON or has an unexpected shape.
    #[error("descriptor could not be parsed: {message}")]
    Parse { message: String },

    /// Descriptor parsed but lacks a usable fileName or url.
    #[error("descriptor has no usable fileName or url")]
    EmptyDescriptor,

    /// Schema file download failed.
    #[error("schema download from {url} failed: {message}")]
    Download { url: String, message: String },

    /// Downloaded bytes do not match the descriptor's content hash.
    #[error("downloaded schema does not match descriptor hash {expected}")]
    HashMismatch { expected: String },

    /// Filesystem error while caching the schema file.
    #[error("schema cache write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Every configured mappings provider failed.
#[derive(Debug, thiserror::Error)]
#[error("no mappings provider succeeded ({} tried)", attempts.len())]
pub struct NoSchemaAvailable {
    /// Provider name paired with the failure that disqualified it, in the
    /// order the providers were tried.
    pub attempts: Vec<(String, ProviderError)>,
}

/// Failures opening the archive or installing keys/schema into it.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveOpenError {
    /// The paks directory could not be opened as an archive.
    #[error("archive at {path} could not be opened: {message}")]
    Open { path: PathBuf, message: String },

    /// The archive rejected the submitted key set.
    #[error("archive rejected submitted keys: {message}")]
    KeysRejected { message: String },

    /// The archive rejected the resolved schema file.
    #[error("archive rejected schema {path}: {message}")]
    SchemaRejected { path: PathBuf, message: String },
}

/// Failures loading a single record. Local to one lookup; the session stays
/// usable.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A schema-dependent read was attempted before schema installation.
    #[error("schema is not installed; record reads are disabled")]
    SchemaNotInstalled,

    /// The logical path has no corresponding container entry.
    #[error("no archive entry for {path}")]
    NotFound { path: String },

    /// The entry's chunk group has no matching dynamic key.
    #[error("entry {path} needs a key for chunk group {group} that was never fetched")]
    MissingGroupKey { path: String, group: Uuid },

    /// The entry exists but could not be decoded with the installed
    /// keys/schema.
    #[error("entry {path} could not be decoded: {message}")]
    Decode { path: String, message: String },
}

/// Fatal bootstrap failure. Any stage failing here means the session cannot
/// be constructed and no export will be attempted.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Key acquisition failed.
    #[error(transparent)]
    Keys(#[from] KeyFetchError),

    /// Decompression helper could not be staged or loaded.
    #[error(transparent)]
    Decompressor(#[from] BootstrapError),

    /// No mappings provider produced a schema.
    #[error(transparent)]
    Mappings(#[from] NoSchemaAvailable),

    /// The archive itself could not be opened or configured.
    #[error(transparent)]
    Archive(#[from] ArchiveOpenError),
}

/// Failures local to one export cycle.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// One of the two input records could not be loaded.
    #[error("missing asset {path}: {source}")]
    MissingAsset {
        path: String,
        #[source]
        source: LoadError,
    },

    /// The external codec refused or failed the export.
    #[error("codec failed: {message}")]
    Codec { message: String },
}

/// Failures reading or writing the on-disk configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Filesystem error.
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file exists but is not valid JSON for [`crate::config::ExportConfig`].
    #[error("config file {path} could not be parsed: {message}")]
    Parse { path: PathBuf, message: String },
}
