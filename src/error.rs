//! Error types for the edgequake-docx2png library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Docx2PngError`] (**returned**): the caller asked for something that
//!   cannot happen right now (unreadable input, a second submission while one
//!   is in flight, a download before anything was converted). Returned as
//!   `Err(Docx2PngError)` from session operations and the `convert*` helpers.
//!
//! * [`ConversionFailure`] (**stored**): the conversion service could not be
//!   reached or answered with an error. It never escapes
//!   [`crate::session::Session::submit`]; instead it is collapsed into the
//!   session's error message and the session moves to
//!   [`crate::state::SessionState::Failed`].

use crate::state::SessionState;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned to callers of the edgequake-docx2png library.
///
/// Service-side failures use [`ConversionFailure`] and are stored in the
/// session rather than propagated here.
#[derive(Debug, Error)]
pub enum Docx2PngError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Session errors ────────────────────────────────────────────────────
    /// A conversion is in flight; the session refuses to change underneath it.
    #[error("A conversion is already in progress")]
    Busy,

    /// `submit()` was called before any file was selected.
    #[error("No file selected.\nSelect a document before converting.")]
    NoFileSelected,

    /// The requested operation has no transition from the current state.
    #[error("Cannot {action} while the session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    /// A download was requested but no converted archive is live.
    #[error("No converted archive is available (session is {state})")]
    NoArtifact { state: SessionState },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// The artifact store could not hold the converted payload.
    #[error("Failed to store conversion result: {0}")]
    ArtifactStore(String),

    /// A handle was used after its artifact had been released.
    #[error("Artifact {id} is not live")]
    UnknownArtifact { id: u64 },

    /// Could not create or write the downloaded archive.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Conversion errors (one-shot API only) ─────────────────────────────
    /// The one-shot helpers surface the session's error message as an `Err`.
    #[error("Conversion of '{file}' failed: {message}")]
    ConversionFailed { file: String, message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a submission did not produce an archive.
///
/// Both variants end in the same place for the user (one error message, the
/// `Failed` state); the distinction only matters when deriving that message.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ConversionFailure {
    /// The exchange never completed: connection refused, DNS, timeout,
    /// or a body that could not be read.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Service { status: u16, reason: Option<String> },
}

impl ConversionFailure {
    /// The message shown to the user.
    ///
    /// A service failure carrying a decoded reason shows that reason verbatim;
    /// everything else shows `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ConversionFailure::Service {
                reason: Some(reason),
                ..
            } => reason.clone(),
            _ => fallback.to_string(),
        }
    }

    /// True when the service was never heard from.
    pub fn is_transport(&self) -> bool {
        matches!(self, ConversionFailure::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_reason_is_user_message() {
        let f = ConversionFailure::Service {
            status: 500,
            reason: Some("bad format".into()),
        };
        assert_eq!(f.user_message("Conversion failed"), "bad format");
        assert!(!f.is_transport());
    }

    #[test]
    fn service_without_reason_uses_fallback() {
        let f = ConversionFailure::Service {
            status: 502,
            reason: None,
        };
        assert_eq!(f.user_message("Conversion failed"), "Conversion failed");
        assert_eq!(f.to_string(), "service returned HTTP 502");
    }

    #[test]
    fn transport_always_uses_fallback() {
        let f = ConversionFailure::Transport {
            reason: "connection refused".into(),
        };
        assert_eq!(f.user_message("Conversion failed"), "Conversion failed");
        assert!(f.is_transport());
        assert!(f.to_string().contains("connection refused"));
    }

    #[test]
    fn invalid_transition_display() {
        let e = Docx2PngError::InvalidTransition {
            action: "submit",
            state: SessionState::Succeeded,
        };
        let msg = e.to_string();
        assert!(msg.contains("submit"), "got: {msg}");
        assert!(msg.contains("succeeded"), "got: {msg}");
    }

    #[test]
    fn conversion_failed_display() {
        let e = Docx2PngError::ConversionFailed {
            file: "x.docx".into(),
            message: "bad format".into(),
        };
        assert!(e.to_string().contains("x.docx"));
        assert!(e.to_string().contains("bad format"));
    }
}
