//! Archive session: composes keys, decompressor, and mappings into typed
//! record access.
//!
//! The session is the one process-wide mutable resource. It is constructed
//! once by [`ArchiveSession::bootstrap`] in the mandatory order (fetch keys,
//! open archive, submit keys, stage + load decompressor, resolve mappings,
//! install schema) and exclusively owned by the orchestrator for the process
//! lifetime. Every bootstrap failure is fatal; once built, per-record
//! failures are local.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::config::{GameVersion, SessionConfig};
use crate::decompressor::{bootstrap_decompressor, DecompressorLoader};
use crate::error::{ArchiveOpenError, LoadError, SessionError};
use crate::keys::{KeyClient, KeySet};
use crate::mappings::{MappingsResolver, SchemaHandle};

/// External pak/container collaborator.
///
/// The container format is opaque to this crate; the backend is expected to
/// decrypt entries with the submitted keys and decode record fields against
/// the installed schema.
pub trait PakBackend {
    /// Open the archive rooted at `paks_dir` for the given game version.
    fn open(paks_dir: &Path, game_version: &GameVersion) -> Result<Self, ArchiveOpenError>
    where
        Self: Sized;

    /// Make the key set available for entry decryption.
    fn submit_keys(&mut self, keys: &KeySet) -> Result<(), ArchiveOpenError>;

    /// Install the schema overlay used to decode record fields.
    fn install_schema(&mut self, schema: &SchemaHandle) -> Result<(), ArchiveOpenError>;

    /// Decode the record at a normalized logical path.
    fn load_record(&self, path: &str) -> Result<AssetRecord, LoadError>;
}

/// Opaque reference to a record decoded by the session.
///
/// Handles are cheap keys into the session's record cache; they never own
/// record data. A handle is only meaningful for the session that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetHandle(String);

impl AssetHandle {
    /// Normalized logical path of the record.
    pub fn path(&self) -> &str {
        &self.0
    }
}

/// A typed record decoded from the archive.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    /// Normalized logical path inside the archive.
    pub path: String,

    /// Record class reported by the schema (e.g. `AnimSequence`).
    pub class_name: String,

    /// Schema-typed fields.
    pub fields: serde_json::Value,

    /// Reference-pose relation. Assigned by
    /// [`ArchiveSession::link_ref_pose`]; a non-owning back-reference the
    /// codec resolves through the session at export time.
    pub ref_pose: Option<AssetHandle>,
}

impl AssetRecord {
    /// Record without a reference-pose relation.
    pub fn new(
        path: impl Into<String>,
        class_name: impl Into<String>,
        fields: serde_json::Value,
    ) -> Self {
        Self {
            path: path.into(),
            class_name: class_name.into(),
            fields,
            ref_pose: None,
        }
    }
}

/// Normalize a user-supplied logical path.
///
/// Archive containers sometimes store a package name twice in the full
/// resource path; when the final segment has no extension, the segment's own
/// name is appended as a synthetic extension. Inputs that already contain a
/// dot pass through unchanged. This is a narrow heuristic, not general path
/// canonicalization.
pub fn normalize_object_path(input: &str) -> String {
    let segment = input.rsplit('/').next().unwrap_or(input);
    if segment.is_empty() || segment.contains('.') {
        input.to_string()
    } else {
        format!("{input}.{segment}")
    }
}

/// Read session over an opened archive.
#[derive(Debug)]
pub struct ArchiveSession<B: PakBackend> {
    backend: B,
    keys: KeySet,
    schema: Option<SchemaHandle>,
    records: HashMap<String, AssetRecord>,
}

impl<B: PakBackend> ArchiveSession<B> {
    /// Run the full startup bootstrap.
    ///
    /// Any stage failing here aborts the session; there is no partial
    /// construction and no internal retry.
    pub async fn bootstrap(
        config: &SessionConfig,
        loader: &dyn DecompressorLoader,
    ) -> Result<Self, SessionError> {
        let client = reqwest::Client::new();

        let keys = KeyClient::new(client.clone(), config.key_endpoint.clone())
            .fetch_keys()
            .await?;

        let mut backend = B::open(&config.paks_dir, &config.game_version)?;
        backend.submit_keys(&keys)?;
        info!(
            paks = %config.paks_dir.display(),
            version = %config.game_version,
            keys = keys.len(),
            "archive opened, keys submitted"
        );

        bootstrap_decompressor(&client, &config.decompressor, loader).await?;

        let schema = MappingsResolver::new(client, config.providers.clone(), &config.data_dir)
            .resolve()
            .await?;

        let mut session = Self::with_backend(backend, keys);
        session.install_schema(schema)?;
        Ok(session)
    }

    /// Wrap an already-open backend. No schema is installed yet; record
    /// reads fail with [`LoadError::SchemaNotInstalled`] until
    /// [`ArchiveSession::install_schema`] succeeds.
    pub fn with_backend(backend: B, keys: KeySet) -> Self {
        Self {
            backend,
            keys,
            schema: None,
            records: HashMap::new(),
        }
    }

    /// Install the schema into the backend and enable record reads.
    pub fn install_schema(&mut self, schema: SchemaHandle) -> Result<(), ArchiveOpenError> {
        self.backend.install_schema(&schema)?;
        info!(schema = %schema.file_name(), "schema installed");
        self.schema = Some(schema);
        Ok(())
    }

    /// The installed schema, if any.
    pub fn schema(&self) -> Option<&SchemaHandle> {
        self.schema.as_ref()
    }

    /// The session key set.
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Load the record at a logical path, reusing the session cache.
    ///
    /// Fails fast when no schema is installed rather than returning
    /// partially-typed data.
    pub fn load(&mut self, path: &str) -> Result<AssetHandle, LoadError> {
        if self.schema.is_none() {
            return Err(LoadError::SchemaNotInstalled);
        }
        let normalized = normalize_object_path(path);
        if self.records.contains_key(&normalized) {
            debug!(path = %normalized, "record cache hit");
        } else {
            let record = self.backend.load_record(&normalized)?;
            debug!(path = %normalized, class = %record.class_name, "record decoded");
            self.records.insert(normalized.clone(), record);
        }
        Ok(AssetHandle(normalized))
    }

    /// The cached record behind a handle.
    pub fn record(&self, handle: &AssetHandle) -> Option<&AssetRecord> {
        self.records.get(handle.path())
    }

    /// Assign `reference` into the reference-pose relation of `additive`.
    ///
    /// Assignment, not a copy: both records stay independently owned by the
    /// session cache and the relation is resolved lazily at export time.
    pub fn link_ref_pose(
        &mut self,
        additive: &AssetHandle,
        reference: &AssetHandle,
    ) -> Result<(), LoadError> {
        if !self.records.contains_key(reference.path()) {
            return Err(LoadError::NotFound {
                path: reference.path().to_string(),
            });
        }
        let record = self
            .records
            .get_mut(additive.path())
            .ok_or_else(|| LoadError::NotFound {
                path: additive.path().to_string(),
            })?;
        record.ref_pose = Some(reference.clone());
        debug!(additive = %additive.path(), reference = %reference.path(), "reference pose linked");
        Ok(())
    }

    /// Resolve the reference-pose relation of a record, if linked and still
    /// cached.
    pub fn resolve_ref_pose(&self, handle: &AssetHandle) -> Option<&AssetRecord> {
        self.record(handle)?
            .ref_pose
            .as_ref()
            .and_then(|reference| self.record(reference))
    }
}
