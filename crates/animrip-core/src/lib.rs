//! Archive-access bootstrap and additive animation export.
//!
//! This crate bootstraps read access to an encrypted, versioned game-asset
//! archive and exports a derived artifact built from two linked records (an
//! additive animation and its reference pose). The pipeline:
//!
//! - [`keys`] — fetch and normalize decryption keys from a remote service
//! - [`decompressor`] — stage and load the native decompression helper
//! - [`mappings`] — resolve a schema overlay through an ordered provider
//!   chain with local caching
//! - [`archive`] — the session composing the above into typed record lookup
//! - [`export`] — load, link, and delegate to the external codec
//!
//! The archive container format and the codec's output layout are external
//! collaborators behind [`archive::PakBackend`] and [`export::AnimCodec`].
//!
//! # Quick Start
//!
//! ```no_run
//! use animrip_core::archive::{ArchiveSession, PakBackend};
//! use animrip_core::config::{AnimFormat, SessionConfig};
//! use animrip_core::export::{run_export_cycle, AnimCodec, ExporterOptions};
//! # use animrip_core::decompressor::DecompressorLoader;
//!
//! # async fn example<B: PakBackend, C: AnimCodec>(
//! #     codec: C,
//! #     loader: &dyn DecompressorLoader,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new("./paks", "./.data");
//! let mut session = ArchiveSession::<B>::bootstrap(&config, loader).await?;
//!
//! let options = ExporterOptions::new(AnimFormat::UeFormat, "./exports");
//! let result = run_export_cycle(
//!     &mut session,
//!     &codec,
//!     &options,
//!     "Game/Anims/Emote_Additive",
//!     "Game/Anims/Emote_RefPose",
//! )?;
//! println!("exported {}", result.file_name);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod decompressor;
pub mod error;
pub mod export;
pub mod keys;
pub mod mappings;

pub use archive::{ArchiveSession, AssetHandle, AssetRecord, PakBackend};
pub use config::{AnimFormat, ExportConfig, GameVersion, SessionConfig};
pub use decompressor::{ensure_decompressor, DecompressorConfig, DecompressorLoader};
pub use error::{
    ArchiveOpenError, BootstrapError, ConfigError, ExportError, KeyFetchError, LoadError,
    NoSchemaAvailable, ProviderError, SessionError,
};
pub use export::{run_export_cycle, run_loop, AnimCodec, ExportResult, ExporterOptions};
pub use keys::{AesKey, KeyClient, KeySet};
pub use mappings::{MappingsDescriptor, MappingsResolver, ProviderEndpoint, SchemaHandle};
