//! Observer bridge
//!
//! Connects the engine's background sessions to an observer that may be
//! detached and replaced at any time, typically because the object owning
//! it was torn down and rebuilt.
//!
//! ```text
//! attach(A) ──→ [no session]  A waits for the next submit
//! submit    ──→ [Running, A]
//! detach()  ──→ [Running, -]
//! worker    ──→ [Completed, -]   result held
//! attach(B) ──→ [Delivered]      B.submit_done() replayed once
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracedrop_core::ports::SubmitObserver;
use tracing::debug;

use crate::session::{Attachment, SubmissionSession};

#[derive(Default)]
struct BridgeState {
    /// Session observers attach to, until it is retired
    session: Option<Arc<SubmissionSession>>,
    /// Observer waiting for the next submission
    pending: Option<Arc<dyn SubmitObserver>>,
}

/// Single-slot, rebindable attachment point between sessions and observers
#[derive(Default)]
pub struct ObserverBridge {
    state: Mutex<BridgeState>,
}

impl ObserverBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `observer`, detaching any observer already attached.
    ///
    /// - No session: the observer waits for the next submission.
    /// - Running session: the observer receives its `submit_done`.
    /// - Session finished while detached: `submit_done` is replayed now, once.
    pub fn attach(&self, observer: Arc<dyn SubmitObserver>) {
        let mut observer = observer;
        loop {
            let session = {
                let mut state = self.lock_state();
                match state.session {
                    Some(ref session) => Arc::clone(session),
                    None => {
                        debug!("No submission in flight; observer kept for the next one");
                        state.pending = Some(observer);
                        return;
                    }
                }
            };

            // The bridge lock is released here; the session lock guards delivery.
            match session.attach(observer) {
                Attachment::Bound => {
                    debug!(session = %session.id(), "Observer attached to running submission");
                    return;
                }
                Attachment::Replayed => {
                    debug!(session = %session.id(), "Replayed finished submission to new observer");
                    self.retire(&session);
                    return;
                }
                Attachment::Finished(returned) => {
                    self.retire(&session);
                    observer = returned;
                }
            }
        }
    }

    /// Detaches the current observer. Safe to call at any time.
    ///
    /// Uploads in flight are not affected.
    pub fn detach(&self) {
        let session = {
            let mut state = self.lock_state();
            state.pending = None;
            state.session.clone()
        };

        if let Some(session) = session {
            session.detach();
            debug!(session = %session.id(), "Observer detached from submission");
        }
    }

    /// Returns the session observers currently attach to, if any.
    pub fn current(&self) -> Option<Arc<SubmissionSession>> {
        self.lock_state().session.clone()
    }

    /// Returns true if an observer waits for the next submission.
    pub fn has_pending_observer(&self) -> bool {
        self.lock_state().pending.is_some()
    }

    /// Takes the observer waiting for the next submission.
    pub(crate) fn take_pending(&self) -> Option<Arc<dyn SubmitObserver>> {
        self.lock_state().pending.take()
    }

    /// Makes `session` current and returns the session it replaces.
    pub(crate) fn begin(&self, session: Arc<SubmissionSession>) -> Option<Arc<SubmissionSession>> {
        let mut state = self.lock_state();
        state.pending = None;
        state.session.replace(session)
    }

    /// Forgets `session` if it is still current.
    pub(crate) fn retire(&self, session: &Arc<SubmissionSession>) {
        let mut state = self.lock_state();
        if state
            .session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            state.session = None;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ObserverBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("ObserverBridge")
            .field("session", &state.session)
            .field("has_pending", &state.pending.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::tests::CountingObserver;
    use crate::session::SessionState;

    fn running(observer: Arc<CountingObserver>) -> Arc<SubmissionSession> {
        Arc::new(SubmissionSession::new(1, Duration::ZERO, observer))
    }

    #[test]
    fn test_attach_without_session_waits_for_next() {
        let bridge = ObserverBridge::new();
        let a = Arc::new(CountingObserver::default());

        bridge.attach(a.clone());
        assert!(bridge.has_pending_observer());
        assert!(bridge.take_pending().is_some());
        assert!(!bridge.has_pending_observer());
    }

    #[test]
    fn test_detach_is_idempotent_and_clears_pending() {
        let bridge = ObserverBridge::new();
        bridge.detach();
        bridge.detach();

        bridge.attach(Arc::new(CountingObserver::default()));
        bridge.detach();
        assert!(!bridge.has_pending_observer());
    }

    #[test]
    fn test_detach_then_reattach_after_completion_replays_once() {
        let bridge = ObserverBridge::new();
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());
        let session = running(a.clone());
        bridge.begin(Arc::clone(&session));

        bridge.detach();
        session.settle();

        bridge.attach(b.clone());
        assert_eq!(b.dones(), 1);
        assert_eq!(a.dones(), 0);
        assert!(bridge.current().is_none(), "replayed session is retired");

        // A later observer waits for the next submission instead.
        let c = Arc::new(CountingObserver::default());
        bridge.attach(c.clone());
        assert_eq!(c.dones(), 0);
        assert!(bridge.has_pending_observer());
    }

    #[test]
    fn test_attach_to_running_session_replaces_observer() {
        let bridge = ObserverBridge::new();
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());
        let session = running(a.clone());
        bridge.begin(Arc::clone(&session));

        bridge.attach(b.clone());
        session.settle();
        assert_eq!(a.dones(), 0);
        assert_eq!(b.dones(), 1);
    }

    #[test]
    fn test_attach_skips_finished_session() {
        let bridge = ObserverBridge::new();
        let a = Arc::new(CountingObserver::default());
        let session = running(a.clone());
        bridge.begin(Arc::clone(&session));
        session.cancel();

        let b = Arc::new(CountingObserver::default());
        bridge.attach(b.clone());
        assert_eq!(b.dones(), 0);
        assert!(bridge.current().is_none());
        assert!(bridge.has_pending_observer());
    }

    #[test]
    fn test_begin_returns_previous_and_drops_pending() {
        let bridge = ObserverBridge::new();
        bridge.attach(Arc::new(CountingObserver::default()));

        let first = running(Arc::new(CountingObserver::default()));
        assert!(bridge.begin(Arc::clone(&first)).is_none());
        assert!(!bridge.has_pending_observer());

        let second = running(Arc::new(CountingObserver::default()));
        let previous = bridge.begin(Arc::clone(&second)).unwrap();
        assert!(Arc::ptr_eq(&previous, &first));

        // Retiring a stale session leaves the current one alone.
        bridge.retire(&first);
        assert!(Arc::ptr_eq(&bridge.current().unwrap(), &second));
        assert_eq!(second.state(), SessionState::Running);
    }
}
