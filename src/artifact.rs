//! Downloadable results: naming, storage, and release.
//!
//! ## Why a store with explicit release?
//!
//! A converted archive is held somewhere transient (a registry entry in
//! memory, a file in a temp directory) until the user downloads it or moves
//! on. Repeated convert cycles would leak those resources unless every
//! replacement releases the previous one. [`ArtifactStore::release`] takes the
//! [`ArtifactHandle`] by value, so a handle cannot be released twice, and the
//! session releases the live handle before it installs a new one.

use crate::error::Docx2PngError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Owned reference to one stored payload.
///
/// Not `Clone`: whoever holds the handle is the only one who can release it.
#[derive(Debug, PartialEq, Eq)]
pub struct ArtifactHandle {
    id: u64,
    location: String,
}

impl ArtifactHandle {
    /// Wrap a store-assigned id and the location callers can show or open.
    pub fn new(id: u64, location: impl Into<String>) -> Self {
        Self {
            id,
            location: location.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

/// Public, cloneable description of a live artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub id: u64,
    /// Suggested download name, e.g. `report_images.zip`.
    pub file_name: String,
    /// Payload length in bytes.
    pub size: u64,
    /// Store-specific location (`memory://artifact/3`, a temp file path, …).
    pub location: String,
}

/// A live artifact: the handle that owns the stored bytes plus its description.
#[derive(Debug)]
pub struct Artifact {
    handle: ArtifactHandle,
    info: ArtifactInfo,
}

impl Artifact {
    pub fn handle(&self) -> &ArtifactHandle {
        &self.handle
    }

    pub fn info(&self) -> &ArtifactInfo {
        &self.info
    }

    pub fn into_handle(self) -> ArtifactHandle {
        self.handle
    }
}

/// Backing storage for converted archives.
///
/// `create` and `open` are called without the session lock and may do I/O.
/// `release` is called with the lock held: keep it short and never call back
/// into the session from it.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `payload` and return the handle that owns it.
    async fn create(&self, payload: Bytes) -> Result<ArtifactHandle, Docx2PngError>;

    /// Read back the payload of artifact `id`. Fails with
    /// [`Docx2PngError::UnknownArtifact`] once it has been released.
    async fn open(&self, id: u64) -> Result<Bytes, Docx2PngError>;

    /// Reclaim whatever backs the handle.
    fn release(&self, handle: ArtifactHandle);

    /// Number of handles created and not yet released.
    fn live_count(&self) -> usize;
}

/// Holds and releases artifacts on behalf of one session.
///
/// Holds at most one live [`Artifact`]. Installing a new one always releases
/// the previous one first.
pub(crate) struct ArtifactSlot {
    current: Option<Artifact>,
}

impl ArtifactSlot {
    pub(crate) fn empty() -> Self {
        Self { current: None }
    }

    pub(crate) fn get(&self) -> Option<&Artifact> {
        self.current.as_ref()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.current.is_some()
    }

    /// Release the live artifact, if any.
    pub(crate) fn release(&mut self, store: &dyn ArtifactStore) {
        if let Some(artifact) = self.current.take() {
            debug!(
                "Releasing artifact {} ({})",
                artifact.info.id, artifact.info.file_name
            );
            store.release(artifact.into_handle());
        }
    }

    /// Release the live artifact, then make `handle` the live one.
    pub(crate) fn install(
        &mut self,
        store: &dyn ArtifactStore,
        handle: ArtifactHandle,
        size: u64,
        file_name: String,
    ) -> &ArtifactInfo {
        self.release(store);

        let info = ArtifactInfo {
            id: handle.id(),
            file_name,
            size,
            location: handle.location().to_string(),
        };
        debug!(
            "Installed artifact {} ({} bytes) at {}",
            info.id, info.size, info.location
        );

        &self.current.insert(Artifact { handle, info }).info
    }
}

// ── Naming ───────────────────────────────────────────────────────────────

/// Derives the suggested download name from the input name.
///
/// `report.docx` → `report_images.zip` with the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNaming {
    /// Source extension stripped from the end of the input name, dot included.
    /// Matched case-insensitively. Default: `.docx`.
    pub source_extension: String,
    /// Marker appended to the stem. Default: `_images`.
    pub suffix: String,
    /// Packaging extension, without the dot. Default: `zip`.
    pub extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            source_extension: ".docx".to_string(),
            suffix: "_images".to_string(),
            extension: "zip".to_string(),
        }
    }
}

impl ArtifactNaming {
    /// Suggested file name for the archive converted from `input_name`.
    pub fn file_name_for(&self, input_name: &str) -> String {
        let stem = strip_suffix_ignore_case(input_name, &self.source_extension);
        format!("{}{}.{}", stem, self.suffix, self.extension)
    }
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> &'a str {
    if suffix.is_empty() || name.len() < suffix.len() {
        return name;
    }
    let cut = name.len() - suffix.len();
    match (name.get(..cut), name.get(cut..)) {
        (Some(stem), Some(tail)) if tail.eq_ignore_ascii_case(suffix) => stem,
        _ => name,
    }
}

// ── In-memory store ──────────────────────────────────────────────────────

/// Keeps payloads in a process-wide registry, like object URLs in a browser.
///
/// Default store when [`crate::config::ClientConfig::artifact_store`] is unset.
#[derive(Default)]
pub struct MemoryArtifactStore {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, Bytes>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for MemoryArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryArtifactStore")
            .field("live", &self.live_count())
            .finish()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn create(&self, payload: Bytes) -> Result<ArtifactHandle, Docx2PngError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.lock().insert(id, payload);
        Ok(ArtifactHandle::new(id, format!("memory://artifact/{id}")))
    }

    async fn open(&self, id: u64) -> Result<Bytes, Docx2PngError> {
        self.entries
            .lock()
            .get(&id)
            .cloned()
            .ok_or(Docx2PngError::UnknownArtifact { id })
    }

    fn release(&self, handle: ArtifactHandle) {
        if self.entries.lock().remove(&handle.id()).is_none() {
            warn!("Release of unknown artifact {}", handle.id());
        }
    }

    fn live_count(&self) -> usize {
        self.entries.lock().len()
    }
}

// ── Temp-file store ──────────────────────────────────────────────────────

/// Writes each payload to its own file inside a private temp directory.
///
/// Files are deleted on release; the directory and anything left in it are
/// deleted when the store is dropped. Keeps large archives out of memory.
pub struct TempFileArtifactStore {
    dir: TempDir,
    next_id: AtomicU64,
    files: Mutex<HashMap<u64, PathBuf>>,
}

impl TempFileArtifactStore {
    pub fn new() -> Result<Self, Docx2PngError> {
        let dir = tempfile::Builder::new()
            .prefix("docx2png-")
            .tempdir()
            .map_err(|e| Docx2PngError::ArtifactStore(format!("temp dir: {e}")))?;
        debug!("Artifact directory: {}", dir.path().display());
        Ok(Self {
            dir,
            next_id: AtomicU64::new(0),
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding the live artifact files.
    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl fmt::Debug for TempFileArtifactStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TempFileArtifactStore")
            .field("dir", &self.dir.path())
            .field("live", &self.live_count())
            .finish()
    }
}

#[async_trait]
impl ArtifactStore for TempFileArtifactStore {
    async fn create(&self, payload: Bytes) -> Result<ArtifactHandle, Docx2PngError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let path = self.dir.path().join(format!("artifact-{id}.bin"));
        tokio::fs::write(&path, &payload)
            .await
            .map_err(|e| Docx2PngError::ArtifactStore(format!("{}: {e}", path.display())))?;
        let location = path.display().to_string();
        self.files.lock().insert(id, path);
        Ok(ArtifactHandle::new(id, location))
    }

    async fn open(&self, id: u64) -> Result<Bytes, Docx2PngError> {
        let path = self
            .files
            .lock()
            .get(&id)
            .cloned()
            .ok_or(Docx2PngError::UnknownArtifact { id })?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|source| Docx2PngError::ReadFailed { path, source })
    }

    fn release(&self, handle: ArtifactHandle) {
        match self.files.lock().remove(&handle.id()) {
            Some(path) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to delete {}: {}", path.display(), e);
                }
            }
            None => warn!("Release of unknown artifact {}", handle.id()),
        }
    }

    fn live_count(&self) -> usize {
        self.files.lock().len()
    }
}
