//! Decompression helper bootstrap.
//!
//! Compressed archive chunks cannot be decoded until a platform-specific
//! native helper is staged under the data directory and loaded into the
//! process. Staging checks three locations in order: the data directory, a
//! legacy location next to the executable (moved, not copied), and finally a
//! fixed distribution URL. The whole routine is idempotent: once staged, no
//! network access happens on later startups.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::error::BootstrapError;

/// Platform-specific file name of the decompression helper.
#[cfg(target_os = "windows")]
pub const DEFAULT_HELPER_NAME: &str = "oo2core_9_win64.dll";
/// Platform-specific file name of the decompression helper.
#[cfg(not(target_os = "windows"))]
pub const DEFAULT_HELPER_NAME: &str = "liboo2corelinux64.so.9";

/// Distribution base the helper is fetched from when not staged anywhere.
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://cdn.fmodel.app/d/oodle";

/// Where the helper lives and where to get it from.
#[derive(Debug, Clone)]
pub struct DecompressorConfig {
    /// Directory the helper is staged into.
    pub data_dir: PathBuf,

    /// File name of the helper binary.
    pub helper_name: String,

    /// Full download URL used when the helper is not already present.
    pub download_url: String,

    /// Legacy location checked before downloading. A helper found here is
    /// moved into `data_dir`. Defaults to the process working directory.
    pub legacy_dir: PathBuf,
}

impl DecompressorConfig {
    /// Config with platform defaults, staging into `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            helper_name: DEFAULT_HELPER_NAME.to_string(),
            download_url: format!("{DEFAULT_DOWNLOAD_BASE}/{DEFAULT_HELPER_NAME}"),
            legacy_dir: PathBuf::from("."),
        }
    }

    /// Override the download URL.
    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    /// Override the helper file name.
    pub fn with_helper_name(mut self, name: impl Into<String>) -> Self {
        self.helper_name = name.into();
        self
    }

    /// Override the legacy lookup directory.
    pub fn with_legacy_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.legacy_dir = dir.into();
        self
    }

    /// Path the helper is expected at once staged.
    pub fn staged_path(&self) -> PathBuf {
        self.data_dir.join(&self.helper_name)
    }
}

/// External collaborator that loads the staged helper into the process.
///
/// Loading must happen before any compressed chunk is decoded. The loader
/// surfaces version incompatibility as
/// [`BootstrapError::IncompatibleHelper`].
pub trait DecompressorLoader {
    /// Load the helper binary at `path` into the process.
    fn load(&self, path: &Path) -> Result<(), BootstrapError>;
}

/// Guarantee the helper is present at its staged path.
///
/// Returns the staged path. Does not load the helper; callers pass the
/// result to a [`DecompressorLoader`].
pub async fn ensure_decompressor(
    client: &reqwest::Client,
    config: &DecompressorConfig,
) -> Result<PathBuf, BootstrapError> {
    let staged = config.staged_path();
    if fs::try_exists(&staged).await? {
        debug!(path = %staged.display(), "decompressor already staged");
        return Ok(staged);
    }

    fs::create_dir_all(&config.data_dir).await?;

    let legacy = config.legacy_dir.join(&config.helper_name);
    if fs::try_exists(&legacy).await? {
        info!(
            from = %legacy.display(),
            to = %staged.display(),
            "moving decompressor from legacy location"
        );
        fs::rename(&legacy, &staged).await?;
        return Ok(staged);
    }

    info!(url = %config.download_url, "downloading decompressor");
    let response = client
        .get(&config.download_url)
        .send()
        .await
        .map_err(|e| BootstrapError::Download {
            url: config.download_url.clone(),
            message: e.to_string(),
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(BootstrapError::Download {
            url: config.download_url.clone(),
            message: format!("status {status}"),
        });
    }
    let bytes = response.bytes().await.map_err(|e| BootstrapError::Download {
        url: config.download_url.clone(),
        message: e.to_string(),
    })?;

    // Write-then-rename so an interrupted download never looks staged.
    let partial = config.data_dir.join(format!("{}.part", config.helper_name));
    fs::write(&partial, &bytes).await?;
    fs::rename(&partial, &staged).await?;
    info!(path = %staged.display(), bytes = bytes.len(), "decompressor staged");
    Ok(staged)
}

/// Stage the helper and load it through the collaborator.
pub async fn bootstrap_decompressor(
    client: &reqwest::Client,
    config: &DecompressorConfig,
    loader: &dyn DecompressorLoader,
) -> Result<PathBuf, BootstrapError> {
    let staged = ensure_decompressor(client, config).await?;
    loader.load(&staged)?;
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_path_joins_name() {
        let config = DecompressorConfig::new("/var/animrip/.data");
        assert_eq!(
            config.staged_path(),
            Path::new("/var/animrip/.data").join(DEFAULT_HELPER_NAME)
        );
    }

    #[test]
    fn test_default_download_url_points_at_helper() {
        let config = DecompressorConfig::new("data");
        assert!(config.download_url.ends_with(DEFAULT_HELPER_NAME));
    }
}
