//! Export orchestration.
//!
//! One export cycle loads an additive animation and its reference pose
//! through the session, links them, and delegates to the external codec.
//! Cycle failures are local: the session stays usable and the orchestrator
//! is immediately ready for the next pair of paths.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::archive::{ArchiveSession, AssetRecord, PakBackend};
use crate::config::AnimFormat;
use crate::error::ExportError;

/// External animation codec collaborator.
///
/// The codec owns curve interpretation and the output byte layout; this
/// crate only hands it the linked records and the configured format.
pub trait AnimCodec {
    /// Export the additive record, resolving the reference pose lazily
    /// through `reference`. Returns the written file name.
    fn export(
        &self,
        additive: &AssetRecord,
        reference: Option<&AssetRecord>,
        options: &ExporterOptions,
    ) -> Result<String, ExportError>;
}

/// Options handed to the codec per cycle.
#[derive(Debug, Clone)]
pub struct ExporterOptions {
    /// Output format.
    pub anim_format: AnimFormat,

    /// Directory exported files are written into.
    pub export_dir: PathBuf,
}

impl ExporterOptions {
    /// Options for a format, writing into `export_dir`.
    pub fn new(anim_format: AnimFormat, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            anim_format,
            export_dir: export_dir.into(),
        }
    }
}

/// Outcome of one successful export cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// File name reported by the codec.
    pub file_name: String,
}

/// Run one export cycle: load both records, link the reference pose into
/// the additive record, delegate to the codec.
///
/// Either load failing maps to [`ExportError::MissingAsset`] with the
/// offending input path; the session is left usable either way.
pub fn run_export_cycle<B, C>(
    session: &mut ArchiveSession<B>,
    codec: &C,
    options: &ExporterOptions,
    additive_path: &str,
    reference_path: &str,
) -> Result<ExportResult, ExportError>
where
    B: PakBackend,
    C: AnimCodec + ?Sized,
{
    let additive = session
        .load(additive_path)
        .map_err(|source| ExportError::MissingAsset {
            path: additive_path.to_string(),
            source,
        })?;
    let reference = session
        .load(reference_path)
        .map_err(|source| ExportError::MissingAsset {
            path: reference_path.to_string(),
            source,
        })?;

    session
        .link_ref_pose(&additive, &reference)
        .map_err(|source| ExportError::MissingAsset {
            path: reference_path.to_string(),
            source,
        })?;

    let additive_record = session
        .record(&additive)
        .ok_or_else(|| ExportError::Codec {
            message: format!("additive record {} left the session cache", additive.path()),
        })?;
    // Lazy resolution: the codec reads through the additive handle and
    // traverses into the reference record at export time.
    let reference_record = session.resolve_ref_pose(&additive);

    let file_name = codec.export(additive_record, reference_record, options)?;
    info!(
        additive = %additive.path(),
        reference = %reference.path(),
        format = %options.anim_format,
        file = %file_name,
        "export complete"
    );
    Ok(ExportResult { file_name })
}

/// Drive export cycles from a line-oriented input until EOF.
///
/// Reads two non-empty lines per cycle (additive path, reference path),
/// reports the result or the error, and keeps going: a failed cycle never
/// terminates the loop.
pub fn run_loop<B, C, R, W>(
    session: &mut ArchiveSession<B>,
    codec: &C,
    options: &ExporterOptions,
    input: R,
    mut output: W,
) -> io::Result<()>
where
    B: PakBackend,
    C: AnimCodec,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        writeln!(output, "Enter the path to the additive pose:")?;
        let Some(additive_path) = next_path(&mut lines)? else {
            break;
        };
        writeln!(output, "Enter the path to the reference pose:")?;
        let Some(reference_path) = next_path(&mut lines)? else {
            break;
        };

        match run_export_cycle(session, codec, options, &additive_path, &reference_path) {
            Ok(result) => writeln!(output, "Exported to: {}", result.file_name)?,
            Err(err) => {
                warn!(error = %err, "export cycle failed");
                writeln!(output, "Export failed: {err}")?;
            }
        }
        writeln!(output, "Ready for next export...")?;
    }
    Ok(())
}

fn next_path<R: BufRead>(lines: &mut io::Lines<R>) -> io::Result<Option<String>> {
    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
    Ok(None)
}
