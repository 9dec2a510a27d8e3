//! In-memory fakes for animrip's external collaborators.
//!
//! The real archive reader and animation codec live outside this workspace;
//! tests exercise the pipeline against:
//!
//! - [`MemoryBackend`] — a [`PakBackend`] over JSON fixture files, keyed by
//!   path stem so extension-inference behaves like a real container.
//! - [`RecordingCodec`] — an [`AnimCodec`] that writes a JSON artifact and
//!   records every call.
//! - [`NoopLoader`] / body builders — fixture plumbing for the remote
//!   endpoints mocked with wiremock.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use animrip_core::archive::{AssetRecord, PakBackend};
use animrip_core::config::{AnimFormat, GameVersion};
use animrip_core::decompressor::DecompressorLoader;
use animrip_core::error::{ArchiveOpenError, BootstrapError, ExportError, LoadError};
use animrip_core::export::{AnimCodec, ExporterOptions};
use animrip_core::keys::KeySet;
use animrip_core::mappings::SchemaHandle;

/// One fixture record, as stored in a `*.json` file under the fake paks
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureEntry {
    /// Logical path without extension (the stem the container indexes by).
    pub path: String,

    /// Record class.
    #[serde(default = "default_class")]
    pub class_name: String,

    /// Chunk group GUID, for entries encrypted with a dynamic key.
    #[serde(default)]
    pub group: Option<Uuid>,

    /// Decoded fields.
    #[serde(default)]
    pub fields: serde_json::Value,
}

fn default_class() -> String {
    "AnimSequence".to_string()
}

impl FixtureEntry {
    /// An animation-sequence entry under the primary key.
    pub fn anim(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            class_name: default_class(),
            group: None,
            fields: serde_json::json!({"numFrames": 30, "rateScale": 1.0}),
        }
    }

    /// Scope the entry to an encrypted chunk group.
    pub fn with_group(mut self, group: Uuid) -> Self {
        self.group = Some(group);
        self
    }

    /// Replace the decoded fields.
    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }
}

/// Write a fixture entry into a fake paks directory so
/// [`MemoryBackend::open`] picks it up.
pub fn write_fixture(paks_dir: &Path, entry: &FixtureEntry) -> io::Result<()> {
    fs::create_dir_all(paks_dir)?;
    let file_name = format!("{}.json", entry.path.replace('/', "_"));
    let body = serde_json::to_string_pretty(entry)?;
    fs::write(paks_dir.join(file_name), body)
}

/// In-memory [`PakBackend`].
///
/// Entries are indexed by path stem (everything before the final dot), so
/// `Game/Anims/Pose.Pose` and `Game/Anims/Pose.uasset` resolve to the same
/// entry — mirroring how real containers address packages.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: HashMap<String, FixtureEntry>,
    keys: Option<KeySet>,
    schema_installed: bool,
}

impl MemoryBackend {
    /// Backend over a list of entries, bypassing the fixture directory.
    pub fn with_entries(entries: Vec<FixtureEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.path.clone(), entry))
                .collect(),
            keys: None,
            schema_installed: false,
        }
    }

    fn stem(path: &str) -> &str {
        match path.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => path,
        }
    }
}

impl PakBackend for MemoryBackend {
    fn open(paks_dir: &Path, _game_version: &GameVersion) -> Result<Self, ArchiveOpenError> {
        let read_dir = fs::read_dir(paks_dir).map_err(|e| ArchiveOpenError::Open {
            path: paks_dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut entries = HashMap::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|e| ArchiveOpenError::Open {
                path: paks_dir.to_path_buf(),
                message: e.to_string(),
            })?;
            let path = dir_entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let body = fs::read_to_string(&path).map_err(|e| ArchiveOpenError::Open {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let entry: FixtureEntry =
                serde_json::from_str(&body).map_err(|e| ArchiveOpenError::Open {
                    path: path.clone(),
                    message: format!("bad fixture: {e}"),
                })?;
            entries.insert(entry.path.clone(), entry);
        }

        Ok(Self {
            entries,
            keys: None,
            schema_installed: false,
        })
    }

    fn submit_keys(&mut self, keys: &KeySet) -> Result<(), ArchiveOpenError> {
        self.keys = Some(keys.clone());
        Ok(())
    }

    fn install_schema(&mut self, _schema: &SchemaHandle) -> Result<(), ArchiveOpenError> {
        self.schema_installed = true;
        Ok(())
    }

    fn load_record(&self, path: &str) -> Result<AssetRecord, LoadError> {
        if !self.schema_installed {
            return Err(LoadError::SchemaNotInstalled);
        }
        let keys = self.keys.as_ref().ok_or_else(|| LoadError::Decode {
            path: path.to_string(),
            message: "no keys submitted".to_string(),
        })?;

        let entry = self
            .entries
            .get(Self::stem(path))
            .ok_or_else(|| LoadError::NotFound {
                path: path.to_string(),
            })?;

        if let Some(group) = entry.group {
            if !keys.has_group(group) {
                return Err(LoadError::MissingGroupKey {
                    path: path.to_string(),
                    group,
                });
            }
        }

        Ok(AssetRecord::new(
            path,
            entry.class_name.clone(),
            entry.fields.clone(),
        ))
    }
}

/// Codec fake that writes a JSON artifact per export and records every
/// call.
#[derive(Default)]
pub struct RecordingCodec {
    /// `(additive path, reference path)` per call, in order.
    pub calls: RefCell<Vec<(String, Option<String>)>>,

    /// When set, every call fails with this message instead of writing.
    pub fail_with: Option<String>,
}

impl RecordingCodec {
    /// Codec that succeeds and writes artifacts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec whose every export fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }
}

fn format_extension(format: AnimFormat) -> &'static str {
    match format {
        AnimFormat::UeFormat => "ueanim",
        AnimFormat::ActorX => "psa",
        AnimFormat::Gltf => "gltf",
    }
}

impl AnimCodec for RecordingCodec {
    fn export(
        &self,
        additive: &AssetRecord,
        reference: Option<&AssetRecord>,
        options: &ExporterOptions,
    ) -> Result<String, ExportError> {
        self.calls.borrow_mut().push((
            additive.path.clone(),
            reference.map(|record| record.path.clone()),
        ));

        if let Some(message) = &self.fail_with {
            return Err(ExportError::Codec {
                message: message.clone(),
            });
        }

        let stem = additive
            .path
            .rsplit('/')
            .next()
            .unwrap_or(&additive.path)
            .split('.')
            .next()
            .unwrap_or("export");
        let file_name = format!("{stem}.{}", format_extension(options.anim_format));

        let artifact = serde_json::json!({
            "additive": additive.fields,
            "reference": reference.map(|record| record.fields.clone()),
        });
        fs::create_dir_all(&options.export_dir).map_err(|e| ExportError::Codec {
            message: e.to_string(),
        })?;
        fs::write(
            options.export_dir.join(&file_name),
            serde_json::to_vec_pretty(&artifact).map_err(|e| ExportError::Codec {
                message: e.to_string(),
            })?,
        )
        .map_err(|e| ExportError::Codec {
            message: e.to_string(),
        })?;

        Ok(file_name)
    }
}

/// Loader that accepts any staged helper.
pub struct NoopLoader;

impl DecompressorLoader for NoopLoader {
    fn load(&self, _path: &Path) -> Result<(), BootstrapError> {
        Ok(())
    }
}

/// Loader that always reports an incompatible helper.
pub struct IncompatibleLoader;

impl DecompressorLoader for IncompatibleLoader {
    fn load(&self, path: &Path) -> Result<(), BootstrapError> {
        Err(BootstrapError::IncompatibleHelper {
            path: path.to_path_buf(),
            message: "fixture loader rejects everything".to_string(),
        })
    }
}

/// JSON body for a mocked key service endpoint.
pub fn key_service_body(
    main_key: &str,
    dynamics: &[(&str, &str, &str)],
) -> serde_json::Value {
    serde_json::json!({
        "version": "++Fortnite+Release-33.20",
        "mainKey": main_key,
        "dynamicKeys": dynamics
            .iter()
            .map(|(name, guid, key)| serde_json::json!({"name": name, "guid": guid, "key": key}))
            .collect::<Vec<_>>(),
    })
}

/// JSON body for a mocked mappings descriptor endpoint (list shape).
pub fn mappings_descriptor_body(file_name: &str, url: &str) -> serde_json::Value {
    serde_json::json!([{
        "url": url,
        "fileName": file_name,
        "length": 1024,
        "uploaded": "2026-08-30T12:00:00Z",
        "meta": {"version": "++Fortnite+Release-33.20", "compressionMethod": "None", "platform": "Windows"}
    }])
}
