//! Observer trait for session transitions.
//!
//! Register an [`Arc<dyn SessionObserver>`] via
//! [`crate::config::ClientConfigBuilder::observer`] or
//! [`crate::session::Session::add_observer`] to receive a fresh
//! [`SessionSnapshot`] after every transition.
//!
//! # Why callbacks?
//!
//! The callback is the least-invasive integration point: a terminal spinner,
//! a GUI re-render, or a log line can all hang off the same hook without the
//! session knowing how the host application updates itself. Callers that
//! prefer to poll or `await` changes can use
//! [`crate::session::Session::subscribe`] instead, which only ever yields the
//! latest snapshot.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docx2png::{ClientConfig, SessionObserver, SessionSnapshot};
//! use std::sync::Arc;
//!
//! struct PrintObserver;
//!
//! impl SessionObserver for PrintObserver {
//!     fn on_transition(&self, snapshot: &SessionSnapshot) {
//!         eprintln!("#{} {}", snapshot.revision, snapshot.state);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .observer(Arc::new(PrintObserver))
//!     .build()
//!     .unwrap();
//! ```

use crate::state::SessionSnapshot;
use std::sync::Arc;

/// Called by the session after each transition.
///
/// Every snapshot is delivered exactly once, in revision order, with no
/// session lock held, so an observer may read or even drive the session from
/// inside `on_transition`. Delivery is done by whichever thread is already
/// delivering: an operation can return before observers have seen its
/// snapshot while another thread is mid-delivery. Slow observers hold up
/// later snapshots, not the session.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, snapshot: &SessionSnapshot);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionSnapshot) + Send + Sync,
{
    fn on_transition(&self, snapshot: &SessionSnapshot) {
        self(snapshot)
    }
}

/// An observer that ignores every snapshot.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_transition(&self, _snapshot: &SessionSnapshot) {}
}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type SharedObserver = Arc<dyn SessionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionState;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn noop_observer_does_not_panic() {
        NoopObserver.on_transition(&SessionSnapshot::initial());
    }

    #[test]
    fn closure_observer_receives_snapshot() {
        let last = Arc::new(AtomicU64::new(u64::MAX));
        let seen = Arc::clone(&last);
        let observer: SharedObserver = Arc::new(move |s: &SessionSnapshot| {
            assert_eq!(s.state, SessionState::Idle);
            seen.store(s.revision, Ordering::SeqCst);
        });

        observer.on_transition(&SessionSnapshot::initial());
        assert_eq!(last.load(Ordering::SeqCst), 0);
    }
}
