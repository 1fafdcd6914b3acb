//! Input handling: the document the user chose, held in memory.
//!
//! An [`InputFile`] is replaced wholesale on every selection and never
//! mutated. Its content is a [`Bytes`] buffer, so handing it to the upload
//! task is a reference-count bump rather than a copy.

use crate::error::Docx2PngError;
use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// MIME type sent for `.docx` uploads.
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A user-chosen document: name, bytes, and when it was chosen.
#[derive(Clone)]
pub struct InputFile {
    name: String,
    content: Bytes,
    selected_at: SystemTime,
}

impl InputFile {
    /// Wrap in-memory content under the given file name.
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            selected_at: SystemTime::now(),
        }
    }

    /// Read a local file.
    ///
    /// No type or size check is made here; `.docx` is only advisory
    /// (see [`InputFile::has_extension`]).
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Docx2PngError> {
        let path = path.as_ref().to_path_buf();

        let content = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(read_error(path, e)),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Read input {} ({} bytes)", path.display(), content.len());
        Ok(Self::new(name, content))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn selected_at(&self) -> SystemTime {
        self.selected_at
    }

    /// Case-insensitive check of the name's extension (`"docx"` or `".docx"`).
    pub fn has_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        Path::new(&self.name)
            .extension()
            .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
    }

    /// MIME type declared for the upload part.
    pub fn mime_type(&self) -> &'static str {
        if self.has_extension("docx") {
            DOCX_MIME
        } else {
            "application/octet-stream"
        }
    }
}

impl fmt::Debug for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("len", &self.content.len())
            .field("selected_at", &self.selected_at)
            .finish()
    }
}

fn read_error(path: PathBuf, e: std::io::Error) -> Docx2PngError {
    match e.kind() {
        std::io::ErrorKind::NotFound => Docx2PngError::FileNotFound { path },
        std::io::ErrorKind::PermissionDenied => Docx2PngError::PermissionDenied { path },
        _ => Docx2PngError::ReadFailed { path, source: e },
    }
}
