//! # edgequake-docx2png
//!
//! Send a DOCX document to a page-rendering service and download the ZIP of
//! page PNGs it returns.
//!
//! ## Why a session?
//!
//! The conversion itself happens elsewhere. What this crate owns is the
//! client-side lifecycle around it: which file is selected, whether a request
//! is in flight, what went wrong last time, and which downloaded archive is
//! live and must be released before the next one. [`Session`] keeps those
//! facts consistent with each other and reports every change as an immutable
//! [`SessionSnapshot`].
//!
//! ## Flow
//!
//! ```text
//! InputFile
//!  │
//!  ├─ 1. Select   Session::select_file      → FileSelected
//!  ├─ 2. Submit   multipart POST /convert   → Converting
//!  ├─ 3. Outcome  archive bytes | error     → Succeeded | Failed
//!  ├─ 4. Keep     ArtifactStore handle, suggested name report_images.zip
//!  └─ 5. Reset    Session::clear_selection  → Idle (artifact released)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docx2png::{convert_to_file, ClientConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .build()?;
//!     let report = convert_to_file("report.docx", Some(Path::new("out/")), &config).await?;
//!     eprintln!("wrote {} ({} bytes)", report.output.display(), report.artifact.size);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docx2png` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docx2png = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod convert;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod session;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{
    ArtifactHandle, ArtifactInfo, ArtifactNaming, ArtifactStore, MemoryArtifactStore,
    TempFileArtifactStore,
};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use convert::{convert_file, convert_sync, convert_to_file, ConversionOutcome, ConversionReport};
pub use error::{ConversionFailure, Docx2PngError};
pub use observer::{NoopObserver, SessionObserver, SharedObserver};
pub use pipeline::input::InputFile;
pub use pipeline::upload::{ConversionService, HttpConversionService};
pub use session::Session;
pub use state::{SelectedFile, SessionSnapshot, SessionState};
