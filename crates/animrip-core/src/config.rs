//! On-disk configuration and session wiring.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::decompressor::DecompressorConfig;
use crate::error::ConfigError;
use crate::keys::DEFAULT_KEY_ENDPOINT;
use crate::mappings::{default_providers, ProviderEndpoint};

/// Config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Output format handed to the external animation codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimFormat {
    /// UE-native interchange format.
    #[default]
    #[serde(rename = "UEFormat")]
    UeFormat,

    /// Legacy ActorX (psa).
    ActorX,

    /// glTF.
    Gltf,
}

impl fmt::Display for AnimFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UeFormat => write!(f, "UEFormat"),
            Self::ActorX => write!(f, "ActorX"),
            Self::Gltf => write!(f, "Gltf"),
        }
    }
}

/// Target game version token, passed through opaquely to the archive
/// backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameVersion(String);

impl GameVersion {
    /// Wrap a version token.
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GameVersion {
    fn default() -> Self {
        Self("ue5.6".to_string())
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator-editable configuration persisted at `data_dir/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportConfig {
    /// Output format for exported animations.
    pub anim_format: AnimFormat,

    /// Game version the archive was built for.
    pub game_version: GameVersion,
}

impl ExportConfig {
    /// Load the config file, or write a default one when absent.
    pub fn load_or_create(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let config = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
            info!(path = %path.display(), "config loaded");
            return Ok(config);
        }

        info!(path = %path.display(), "config file not found, writing defaults");
        let config = Self::default();
        fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string_pretty(&config).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, content)?;
        Ok(config)
    }
}

/// Everything the bootstrap needs to build an
/// [`crate::archive::ArchiveSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory holding the archive containers.
    pub paks_dir: PathBuf,

    /// Local state directory: staged decompressor, cached schema files,
    /// config file.
    pub data_dir: PathBuf,

    /// Game version token passed to the archive backend.
    pub game_version: GameVersion,

    /// Key-distribution endpoint.
    pub key_endpoint: String,

    /// Mappings provider chain, in priority order.
    pub providers: Vec<ProviderEndpoint>,

    /// Decompression helper staging config.
    pub decompressor: DecompressorConfig,
}

impl SessionConfig {
    /// Config with default endpoints for the given directories.
    pub fn new(paks_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            paks_dir: paks_dir.into(),
            decompressor: DecompressorConfig::new(&data_dir),
            data_dir,
            game_version: GameVersion::default(),
            key_endpoint: DEFAULT_KEY_ENDPOINT.to_string(),
            providers: default_providers(),
        }
    }

    /// Override the key endpoint.
    pub fn with_key_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.key_endpoint = endpoint.into();
        self
    }

    /// Replace the provider chain.
    pub fn with_providers(mut self, providers: Vec<ProviderEndpoint>) -> Self {
        self.providers = providers;
        self
    }

    /// Override the game version token.
    pub fn with_game_version(mut self, version: GameVersion) -> Self {
        self.game_version = version;
        self
    }

    /// Override the decompressor staging config.
    pub fn with_decompressor(mut self, decompressor: DecompressorConfig) -> Self {
        self.decompressor = decompressor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = TempDir::new().unwrap();
        let config = ExportConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(config, ExportConfig::default());

        let written = fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(written.contains("UEFormat"));
        assert!(written.contains("ue5.6"));
    }

    #[test]
    fn test_load_or_create_round_trips() {
        let dir = TempDir::new().unwrap();
        let custom = ExportConfig {
            anim_format: AnimFormat::Gltf,
            game_version: GameVersion::new("ue5.4"),
        };
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            serde_json::to_string(&custom).unwrap(),
        )
        .unwrap();

        let loaded = ExportConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(loaded, custom);
    }

    #[test]
    fn test_invalid_config_is_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{not json").unwrap();
        let err = ExportConfig::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"animFormat": "ActorX"}"#,
        )
        .unwrap();
        let loaded = ExportConfig::load_or_create(dir.path()).unwrap();
        assert_eq!(loaded.anim_format, AnimFormat::ActorX);
        assert_eq!(loaded.game_version, GameVersion::default());
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::new("./paks", "./data");
        assert_eq!(config.key_endpoint, DEFAULT_KEY_ENDPOINT);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.decompressor.data_dir, config.data_dir);
    }
}
