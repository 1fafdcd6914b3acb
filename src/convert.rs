//! One-shot conversion entry points.
//!
//! ## Why a one-shot API?
//!
//! Scripts and batch jobs do not need an interactive session: they have a
//! path, want an archive, and treat a failed conversion as an error. These
//! helpers drive a private [`Session`] through select → submit → download →
//! clear and turn the session's error message into
//! [`Docx2PngError::ConversionFailed`]. Use [`Session`] directly when the
//! host wants to observe state, keep the archive around, or retry.

use crate::artifact::ArtifactInfo;
use crate::config::ClientConfig;
use crate::error::Docx2PngError;
use crate::pipeline::input::InputFile;
use crate::session::Session;
use crate::state::{SessionSnapshot, SessionState};
use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Archive bytes plus their description, from [`convert_file`].
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub artifact: ArtifactInfo,
    pub bytes: Bytes,
    pub duration_ms: u64,
}

/// Summary of a [`convert_to_file`] run.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    /// Name of the submitted document.
    pub input: String,
    /// Where the archive was written.
    pub output: PathBuf,
    pub artifact: ArtifactInfo,
    /// Wall-clock time from submission to archive on disk.
    pub duration_ms: u64,
}

/// Convert a local document and return the archive in memory.
///
/// # Errors
/// - File not found / permission denied
/// - [`Docx2PngError::ConversionFailed`] when the service or transport failed
pub async fn convert_file(
    input: impl AsRef<Path>,
    config: &ClientConfig,
) -> Result<ConversionOutcome, Docx2PngError> {
    let start = Instant::now();
    let session = Session::new(config.clone())?;
    run(&session, input.as_ref()).await?;

    let (artifact, bytes) = session.artifact_bytes().await?;
    session.clear_selection()?;

    Ok(ConversionOutcome {
        artifact,
        bytes,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Convert a local document and write the archive to `output`.
///
/// When `output` is `None` or an existing directory the suggested file name
/// (e.g. `report_images.zip`) is used.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output: Option<&Path>,
    config: &ClientConfig,
) -> Result<ConversionReport, Docx2PngError> {
    let start = Instant::now();
    let session = Session::new(config.clone())?;
    let snapshot = run(&session, input.as_ref()).await?;

    let dest = output.unwrap_or_else(|| Path::new("."));
    let written = session.download_to(dest).await?;
    let artifact = session
        .artifact()
        .ok_or(Docx2PngError::NoArtifact {
            state: session.state(),
        })?;
    session.clear_selection()?;

    Ok(ConversionReport {
        input: snapshot.file.map(|f| f.name).unwrap_or_default(),
        output: written,
        artifact,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Synchronous wrapper around [`convert_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    output: Option<&Path>,
    config: &ClientConfig,
) -> Result<ConversionReport, Docx2PngError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Docx2PngError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_to_file(input, output, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Select and submit; a `Failed` outcome becomes an `Err`.
async fn run(session: &Session, input: &Path) -> Result<SessionSnapshot, Docx2PngError> {
    let file = InputFile::from_path(input).await?;
    let name = file.name().to_string();
    if !file.has_extension("docx") {
        warn!("{} does not look like a .docx file; sending it anyway", name);
    }

    session.select_file(Some(file))?;
    let snapshot = session.submit().await?;

    match snapshot.state {
        SessionState::Succeeded => {
            info!("Converted {}", name);
            Ok(snapshot)
        }
        state => {
            let message = snapshot
                .error
                .unwrap_or_else(|| format!("session ended in state '{state}'"));
            Err(Docx2PngError::ConversionFailed {
                file: name,
                message,
            })
        }
    }
}
