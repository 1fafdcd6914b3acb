//! The conversion session: selection, submission, result, reset.
//!
//! ## Shape
//!
//! A [`Session`] is a cheap, cloneable handle over shared state. Every
//! operation takes the state lock, applies its whole transition, records a
//! new [`SessionSnapshot`], and releases the lock before anyone is notified.
//! The lock is never held across an `.await`: the conversion request and
//! artifact store I/O both happen outside it.
//!
//! Observers get snapshots from an outbox filled under the lock, so they see
//! them in revision order even when several threads drive the session.
//!
//! ```text
//!            select            submit              2xx
//!   Idle ───────────▶ FileSelected ───────▶ Converting ───────▶ Succeeded
//!    ▲                    ▲   │ select            │ failure         │
//!    │ clear              │   └───────┘           ▼                 │
//!    └──────── any ───────┴─────── select ───── Failed ◀────────────┘
//!                                                 │ retry ──▶ Converting
//! ```
//!
//! ## Requests outlive their callers
//!
//! The request runs on its own Tokio task. Dropping the `submit()` future
//! does not cancel it; the outcome is still applied when it arrives. The task
//! holds only a weak reference to the session, so if every handle has been
//! dropped by then, the outcome is discarded quietly.

use crate::artifact::{
    ArtifactHandle, ArtifactInfo, ArtifactNaming, ArtifactSlot, ArtifactStore, MemoryArtifactStore,
};
use crate::config::ClientConfig;
use crate::error::{ConversionFailure, Docx2PngError};
use crate::observer::SharedObserver;
use crate::pipeline::input::InputFile;
use crate::pipeline::upload::{ConversionService, HttpConversionService};
use crate::state::{SelectedFile, SessionSnapshot, SessionState};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Everything a transition may touch. Guarded by one lock.
struct SessionInner {
    file: Option<InputFile>,
    error: Option<String>,
    artifact: ArtifactSlot,
    /// Id of the submission in flight, if any. This is the busy flag.
    in_flight: Option<u64>,
    next_submission: u64,
    revision: u64,
}

impl SessionInner {
    fn state(&self) -> SessionState {
        SessionState::derive(
            self.file.is_some(),
            self.in_flight.is_some(),
            self.artifact.is_live(),
            self.error.is_some(),
        )
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            revision: self.revision,
            state: self.state(),
            file: self.file.as_ref().map(|f| SelectedFile {
                name: f.name().to_string(),
                size: f.len() as u64,
                selected_at: f.selected_at(),
            }),
            error: self.error.clone(),
            artifact: self.artifact.get().map(|a| a.info().clone()),
        }
    }
}

/// Snapshots waiting for observers, in revision order.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<SessionSnapshot>,
    /// Set while some thread is delivering; others only enqueue.
    draining: bool,
}

/// Resets `draining` if an observer panics mid-delivery.
struct Draining<'a>(&'a Mutex<Outbox>);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

/// What a submission produced, ready to apply under the lock.
enum Settled {
    Archive { handle: ArtifactHandle, size: u64 },
    StoreFailed(Docx2PngError),
    Failed(ConversionFailure),
}

struct Shared {
    inner: Mutex<SessionInner>,
    store: Arc<dyn ArtifactStore>,
    observers: Mutex<Vec<SharedObserver>>,
    outbox: Mutex<Outbox>,
    updates: watch::Sender<SessionSnapshot>,
    naming: ArtifactNaming,
    fallback_message: String,
}

impl Shared {
    /// Bump the revision and publish the snapshot. Call with the lock held,
    /// after the transition is complete, then call [`Shared::deliver`] once
    /// the lock is released.
    fn commit(&self, inner: &mut SessionInner) -> SessionSnapshot {
        inner.revision += 1;
        let snapshot = inner.snapshot();
        debug!("Session #{} → {}", snapshot.revision, snapshot.state);
        self.updates.send_replace(snapshot.clone());
        self.outbox.lock().queue.push_back(snapshot.clone());
        snapshot
    }

    /// Hand queued snapshots to observers. Call without the state lock.
    ///
    /// Only one thread drains at a time; a thread that finds delivery already
    /// under way leaves its snapshot to the drainer.
    fn deliver(&self) {
        {
            let mut outbox = self.outbox.lock();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _reset = Draining(&self.outbox);

        loop {
            let snapshot = {
                let mut outbox = self.outbox.lock();
                match outbox.queue.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            let observers = self.observers.lock().clone();
            for observer in &observers {
                observer.on_transition(&snapshot);
            }
        }
    }

    /// Apply the outcome of submission `id`. Clears the busy flag first.
    fn finish(&self, id: u64, settled: Settled) {
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.in_flight != Some(id) {
                warn!("Ignoring outcome of stale submission {}", id);
                if let Settled::Archive { handle, .. } = settled {
                    self.store.release(handle);
                }
                return;
            }
            inner.in_flight = None;

            match settled {
                Settled::Archive { handle, size } => {
                    let name = inner
                        .file
                        .as_ref()
                        .map(|f| self.naming.file_name_for(f.name()))
                        .unwrap_or_else(|| self.naming.file_name_for("document"));
                    let info = inner
                        .artifact
                        .install(self.store.as_ref(), handle, size, name);
                    info!("Conversion succeeded: {} ({} bytes)", info.file_name, info.size);
                    inner.error = None;
                }
                Settled::StoreFailed(e) => {
                    error!("Could not keep the converted archive: {}", e);
                    inner.artifact.release(self.store.as_ref());
                    inner.error = Some(e.to_string());
                }
                Settled::Failed(failure) => {
                    inner.artifact.release(self.store.as_ref());
                    let message = failure.user_message(&self.fallback_message);
                    info!("Conversion failed: {} ({})", message, failure);
                    inner.error = Some(message);
                }
            }
            self.commit(inner);
        }
        self.deliver();
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.artifact.release(self.store.as_ref());
    }
}

/// Settles one submission exactly once.
///
/// [`Completion::settle`] stores the archive (outside the state lock) and
/// applies the real outcome. If the request task ends any other way (panic,
/// runtime shutdown) the guard's `Drop` settles the submission as a failure,
/// so the session never stays busy.
struct Completion {
    shared: Weak<Shared>,
    id: u64,
    settled: bool,
}

impl Completion {
    fn new(shared: Weak<Shared>, id: u64) -> Self {
        Self {
            shared,
            id,
            settled: false,
        }
    }

    async fn settle(mut self, outcome: Result<Bytes, ConversionFailure>) {
        let Some(shared) = self.shared.upgrade() else {
            self.settled = true;
            debug!("Session dropped; discarding outcome of submission {}", self.id);
            return;
        };

        let settled = match outcome {
            Ok(payload) => {
                let size = payload.len() as u64;
                match shared.store.create(payload).await {
                    Ok(handle) => Settled::Archive { handle, size },
                    Err(e) => Settled::StoreFailed(e),
                }
            }
            Err(failure) => Settled::Failed(failure),
        };
        self.settled = true;
        shared.finish(self.id, settled);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.settled = true;
        let failure = ConversionFailure::Transport {
            reason: "conversion task ended without a response".into(),
        };
        match self.shared.upgrade() {
            Some(shared) => shared.finish(self.id, Settled::Failed(failure)),
            None => debug!("Session dropped; discarding outcome of submission {}", self.id),
        }
    }
}

/// A single-document conversion session.
///
/// Cloning a `Session` yields another handle to the same session.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docx2png::{ClientConfig, InputFile, Session, SessionState};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::new(ClientConfig::default())?;
/// session.select_file(Some(InputFile::from_path("report.docx").await?))?;
///
/// let snapshot = session.submit().await?;
/// match snapshot.state {
///     SessionState::Succeeded => {
///         let path = session.download_to(".").await?;
///         println!("saved {}", path.display());
///     }
///     _ => eprintln!("{}", snapshot.error.unwrap_or_default()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
    service: Arc<dyn ConversionService>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Session {
    /// Create an idle session.
    ///
    /// Uses `config.service` if set, otherwise an [`HttpConversionService`]
    /// for `config.base_url`; uses `config.artifact_store` if set, otherwise
    /// a [`MemoryArtifactStore`].
    pub fn new(config: ClientConfig) -> Result<Self, Docx2PngError> {
        let service: Arc<dyn ConversionService> = match config.service {
            Some(ref service) => Arc::clone(service),
            None => Arc::new(HttpConversionService::new(&config)?),
        };
        let store: Arc<dyn ArtifactStore> = match config.artifact_store {
            Some(ref store) => Arc::clone(store),
            None => Arc::new(MemoryArtifactStore::new()),
        };

        let (updates, _) = watch::channel(SessionSnapshot::initial());
        let shared = Arc::new(Shared {
            inner: Mutex::new(SessionInner {
                file: None,
                error: None,
                artifact: ArtifactSlot::empty(),
                in_flight: None,
                next_submission: 0,
                revision: 0,
            }),
            store,
            observers: Mutex::new(config.observers),
            outbox: Mutex::new(Outbox::default()),
            updates,
            naming: config.naming,
            fallback_message: config.fallback_message,
        });

        Ok(Self { shared, service })
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.inner.lock().snapshot()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state()
    }

    /// Register another observer. It sees transitions from now on.
    pub fn add_observer(&self, observer: SharedObserver) {
        self.shared.observers.lock().push(observer);
    }

    /// Receiver that always holds the latest snapshot.
    ///
    /// Intermediate snapshots may be skipped if the receiver lags; use a
    /// [`crate::observer::SessionObserver`] to see every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    // ── Selection ────────────────────────────────────────────────────────

    /// Select a document, replacing any previous selection.
    ///
    /// `None` (an empty selection) changes nothing. Otherwise the error is
    /// cleared, any live artifact is released, and the session moves to
    /// [`SessionState::FileSelected`]. Rejected with
    /// [`Docx2PngError::Busy`] while a conversion is in flight.
    pub fn select_file(&self, candidate: Option<InputFile>) -> Result<SessionSnapshot, Docx2PngError> {
        let Some(file) = candidate else {
            debug!("Empty selection ignored");
            return Ok(self.snapshot());
        };

        let snapshot = {
            let mut inner = self.shared.inner.lock();
            if inner.in_flight.is_some() {
                warn!("Selection of {} rejected: conversion in progress", file.name());
                return Err(Docx2PngError::Busy);
            }
            inner.artifact.release(self.shared.store.as_ref());
            inner.error = None;
            info!("Selected {} ({} bytes)", file.name(), file.len());
            inner.file = Some(file);
            self.shared.commit(&mut inner)
        };
        self.shared.deliver();
        Ok(snapshot)
    }

    /// Drop the selection, the artifact, and the error; back to
    /// [`SessionState::Idle`]. Idempotent.
    pub fn clear_selection(&self) -> Result<SessionSnapshot, Docx2PngError> {
        let snapshot = {
            let mut inner = self.shared.inner.lock();
            if inner.in_flight.is_some() {
                warn!("Clear rejected: conversion in progress");
                return Err(Docx2PngError::Busy);
            }
            inner.artifact.release(self.shared.store.as_ref());
            inner.file = None;
            inner.error = None;
            self.shared.commit(&mut inner)
        };
        self.shared.deliver();
        Ok(snapshot)
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Send the selected file for conversion and wait for the outcome.
    ///
    /// Only valid from [`SessionState::FileSelected`]. Service and transport
    /// failures do not return `Err`: they leave the session in
    /// [`SessionState::Failed`] with an error message, and the returned
    /// snapshot says so.
    ///
    /// # Errors
    /// - [`Docx2PngError::Busy`]: a conversion is already in flight; no
    ///   request is issued
    /// - [`Docx2PngError::NoFileSelected`]: nothing to send
    /// - [`Docx2PngError::InvalidTransition`]: the session already holds a
    ///   result; select a file again (or [`Session::retry`] after a failure)
    pub async fn submit(&self) -> Result<SessionSnapshot, Docx2PngError> {
        self.start("submit", SessionState::FileSelected).await
    }

    /// Re-send the selected file after a failure.
    ///
    /// Only valid from [`SessionState::Failed`]; otherwise behaves exactly
    /// like [`Session::submit`].
    pub async fn retry(&self) -> Result<SessionSnapshot, Docx2PngError> {
        self.start("retry", SessionState::Failed).await
    }

    async fn start(
        &self,
        action: &'static str,
        from: SessionState,
    ) -> Result<SessionSnapshot, Docx2PngError> {
        let (id, file, snapshot) = {
            let mut inner = self.shared.inner.lock();
            match inner.state() {
                s if s == from => {}
                SessionState::Converting => {
                    warn!("{} rejected: conversion in progress", action);
                    return Err(Docx2PngError::Busy);
                }
                SessionState::Idle => return Err(Docx2PngError::NoFileSelected),
                state => return Err(Docx2PngError::InvalidTransition { action, state }),
            }
            let file = inner.file.clone().ok_or(Docx2PngError::NoFileSelected)?;

            inner.error = None;
            inner.artifact.release(self.shared.store.as_ref());
            inner.next_submission += 1;
            let id = inner.next_submission;
            inner.in_flight = Some(id);
            (id, file, self.shared.commit(&mut inner))
        };
        self.shared.deliver();
        info!("Submission {} started for {}", id, file.name());

        let service = Arc::clone(&self.service);
        let completion = Completion::new(Arc::downgrade(&self.shared), id);
        let task = tokio::spawn(async move {
            let outcome = service.convert(&file).await;
            completion.settle(outcome).await;
        });

        if let Err(e) = task.await {
            // The completion guard has already settled the session.
            error!("Submission {} task failed: {}", id, e);
        }
        Ok(self.snapshot())
    }

    // ── Download ─────────────────────────────────────────────────────────

    /// Description of the live artifact, if any.
    pub fn artifact(&self) -> Option<ArtifactInfo> {
        self.shared
            .inner
            .lock()
            .artifact
            .get()
            .map(|a| a.info().clone())
    }

    /// Read the converted archive. Requires [`SessionState::Succeeded`].
    ///
    /// The store is read after the state lock is released; if another handle
    /// replaces the artifact in between, this fails with
    /// [`Docx2PngError::UnknownArtifact`].
    pub async fn artifact_bytes(&self) -> Result<(ArtifactInfo, Bytes), Docx2PngError> {
        let info = {
            let inner = self.shared.inner.lock();
            let state = inner.state();
            match (state, inner.artifact.get()) {
                (SessionState::Succeeded, Some(artifact)) => artifact.info().clone(),
                _ => return Err(Docx2PngError::NoArtifact { state }),
            }
        };
        let bytes = self.shared.store.open(info.id).await?;
        Ok((info, bytes))
    }

    /// Write the converted archive to `dest` and return the written path.
    ///
    /// If `dest` is an existing directory, or ends with a path separator, the
    /// suggested file name is appended. Uses an atomic write (temp file +
    /// rename) so a partial archive is never left behind.
    pub async fn download_to(&self, dest: impl AsRef<Path>) -> Result<PathBuf, Docx2PngError> {
        let (info, bytes) = self.artifact_bytes().await?;
        let dest = dest.as_ref();
        let names_dir = dest.as_os_str().to_string_lossy().ends_with(['/', std::path::MAIN_SEPARATOR]);
        let path = if names_dir || tokio::fs::metadata(dest).await.is_ok_and(|m| m.is_dir()) {
            dest.join(&info.file_name)
        } else {
            dest.to_path_buf()
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Docx2PngError::OutputWriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| Docx2PngError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                warn!("Failed to remove {}: {}", tmp_path.display(), cleanup);
            }
            return Err(Docx2PngError::OutputWriteFailed { path, source: e });
        }

        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}
