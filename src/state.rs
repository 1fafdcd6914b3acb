//! Session state and the immutable snapshots emitted on every transition.
//!
//! [`SessionState`] is never stored. It is computed from what the session
//! holds (a file, a request in flight, a live artifact, an error message),
//! so the state and the resources it describes cannot drift apart.

use crate::artifact::ArtifactInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// The five states of a conversion session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing selected.
    Idle,
    /// A file is selected and no result exists for it yet.
    FileSelected,
    /// A request is in flight.
    Converting,
    /// A downloadable archive is live.
    Succeeded,
    /// The last submission failed; an error message is set.
    Failed,
}

impl SessionState {
    /// Derive the state from the session's holdings.
    ///
    /// The in-flight flag wins, then the artifact, then the error.
    pub fn derive(has_file: bool, in_flight: bool, has_artifact: bool, has_error: bool) -> Self {
        if in_flight {
            SessionState::Converting
        } else if has_artifact {
            SessionState::Succeeded
        } else if has_error {
            SessionState::Failed
        } else if has_file {
            SessionState::FileSelected
        } else {
            SessionState::Idle
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::FileSelected => "file selected",
            SessionState::Converting => "converting",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a snapshot reveals about the selected input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFile {
    /// File name as selected, including its extension.
    pub name: String,
    /// Content length in bytes.
    pub size: u64,
    /// When the file was selected.
    pub selected_at: SystemTime,
}

/// Immutable view of a session, emitted after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Increments by one on every transition.
    pub revision: u64,
    pub state: SessionState,
    pub file: Option<SelectedFile>,
    pub error: Option<String>,
    pub artifact: Option<ArtifactInfo>,
}

impl SessionSnapshot {
    /// The snapshot of a freshly constructed session.
    pub fn initial() -> Self {
        Self {
            revision: 0,
            state: SessionState::Idle,
            file: None,
            error: None,
            artifact: None,
        }
    }

    /// The binary busy flag.
    pub fn is_busy(&self) -> bool {
        self.state == SessionState::Converting
    }

    /// Whether "Convert" is available.
    pub fn can_submit(&self) -> bool {
        self.state == SessionState::FileSelected
    }

    /// Whether the selected file can be re-submitted after a failure.
    pub fn can_retry(&self) -> bool {
        self.state == SessionState::Failed
    }

    /// Whether "Clear" is available: not busy, and something to clear.
    pub fn can_clear(&self) -> bool {
        !self.is_busy() && (self.file.is_some() || self.artifact.is_some())
    }

    /// Whether a converted archive can be downloaded.
    pub fn can_download(&self) -> bool {
        self.state == SessionState::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_precedence() {
        use SessionState::*;
        assert_eq!(SessionState::derive(false, false, false, false), Idle);
        assert_eq!(SessionState::derive(true, false, false, false), FileSelected);
        assert_eq!(SessionState::derive(true, true, false, false), Converting);
        assert_eq!(SessionState::derive(true, false, true, false), Succeeded);
        assert_eq!(SessionState::derive(true, false, false, true), Failed);
    }

    #[test]
    fn initial_snapshot_affordances() {
        let s = SessionSnapshot::initial();
        assert_eq!(s.state, SessionState::Idle);
        assert!(!s.is_busy());
        assert!(!s.can_submit());
        assert!(!s.can_clear());
        assert!(!s.can_download());
    }

    #[test]
    fn state_serialises_snake_case() {
        let json = serde_json::to_string(&SessionState::FileSelected).unwrap();
        assert_eq!(json, "\"file_selected\"");
    }
}
