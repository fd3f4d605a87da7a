//! SubmissionSession - one upload attempt
//!
//! A session tracks a single submission from the moment its batch is
//! claimed until the terminal notification reaches an observer. Its
//! outcome is a value that is either unsettled (`Running`) or settled
//! (`Completed`, `Delivered`, `Cancelled`). At most one observer is
//! registered at a time; registering on a settled-but-undelivered session
//! delivers immediately.
//!
//! Attach, detach and delivery decide under the same lock, so the terminal
//! notification is delivered exactly once, and only to the observer bound
//! at that moment. The callback itself runs after the lock is released, so
//! an observer may detach or re-attach from inside `submit_done`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracedrop_core::ports::SubmitObserver;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle state of a submission session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Uploads or the minimum delay are still in progress
    Running,
    /// Finished while no observer was attached; waiting to be replayed
    Completed,
    /// The terminal notification has been delivered
    Delivered,
    /// Superseded or cancelled; no notification will be delivered
    Cancelled,
}

impl SessionState {
    /// Returns true if the session is still in progress
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }

    /// Returns true if the session has nothing more to deliver
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Delivered | SessionState::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Running => write!(f, "running"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Delivered => write!(f, "delivered"),
            SessionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What happened when the worker settled a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// `submit_done` reached the attached observer
    Delivered,
    /// No observer was attached; held for the next one
    Held,
    /// The session had been cancelled; nothing delivered
    Suppressed,
}

/// Result of binding an observer to a session
pub(crate) enum Attachment {
    /// Bound to a running session
    Bound,
    /// The session had completed; `submit_done` was replayed
    Replayed,
    /// The session has nothing left to deliver; the observer is handed back
    Finished(Arc<dyn SubmitObserver>),
}

struct Slot {
    state: SessionState,
    observer: Option<Arc<dyn SubmitObserver>>,
}

/// Bookkeeping for one submission attempt
pub struct SubmissionSession {
    id: Uuid,
    records: usize,
    started_at: Instant,
    min_delay: Duration,
    cancel: CancellationToken,
    slot: Mutex<Slot>,
    worker_done: watch::Sender<bool>,
}

impl SubmissionSession {
    /// Creates a running session for `records` crash records, bound to `observer`.
    ///
    /// The start timestamp is taken here.
    pub fn new(records: usize, min_delay: Duration, observer: Arc<dyn SubmitObserver>) -> Self {
        let (worker_done, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            records,
            started_at: Instant::now(),
            min_delay,
            cancel: CancellationToken::new(),
            slot: Mutex::new(Slot {
                state: SessionState::Running,
                observer: Some(observer),
            }),
            worker_done,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of records in the submitted batch
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Part of the minimum delay that has not elapsed yet
    pub fn remaining_delay(&self) -> Duration {
        self.min_delay.saturating_sub(self.started_at.elapsed())
    }

    pub fn state(&self) -> SessionState {
        self.lock_slot().state
    }

    /// Returns true if an observer is currently bound
    pub fn has_observer(&self) -> bool {
        self.lock_slot().observer.is_some()
    }

    /// Token cancelled when the session is superseded or cancelled
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Binds `observer`, replacing any observer already bound.
    pub(crate) fn attach(&self, observer: Arc<dyn SubmitObserver>) -> Attachment {
        {
            let mut slot = self.lock_slot();
            match slot.state {
                SessionState::Running => {
                    if slot.observer.replace(observer).is_some() {
                        debug!(session = %self.id, "Replaced observer on running submission");
                    }
                    return Attachment::Bound;
                }
                SessionState::Completed => slot.state = SessionState::Delivered,
                SessionState::Delivered | SessionState::Cancelled => {
                    return Attachment::Finished(observer)
                }
            }
        }

        observer.submit_done();
        Attachment::Replayed
    }

    /// Unbinds the current observer. Background work is not affected.
    pub(crate) fn detach(&self) {
        self.lock_slot().observer = None;
    }

    /// Settles the session once the worker is done.
    pub(crate) fn settle(&self) -> Settlement {
        let observer = {
            let mut slot = self.lock_slot();
            match slot.state {
                SessionState::Running => match slot.observer.take() {
                    Some(observer) => {
                        slot.state = SessionState::Delivered;
                        observer
                    }
                    None => {
                        slot.state = SessionState::Completed;
                        return Settlement::Held;
                    }
                },
                SessionState::Cancelled => return Settlement::Suppressed,
                // Settling twice is a no-op.
                SessionState::Completed => return Settlement::Held,
                SessionState::Delivered => return Settlement::Delivered,
            }
        };

        observer.submit_done();
        Settlement::Delivered
    }

    /// Cancels the session so no terminal notification is delivered.
    ///
    /// Interrupts the minimum delay. Uploads already under way finish on
    /// their own.
    pub(crate) fn cancel(&self) {
        {
            let mut slot = self.lock_slot();
            if matches!(slot.state, SessionState::Running | SessionState::Completed) {
                slot.state = SessionState::Cancelled;
                slot.observer = None;
            }
        }
        self.cancel.cancel();
    }

    /// Records that the background worker has exited.
    pub(crate) fn mark_worker_finished(&self) {
        self.worker_done.send_replace(true);
    }

    /// Resolves once the background worker has exited.
    pub async fn worker_finished(&self) {
        let mut rx = self.worker_done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SubmissionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.lock_slot();
        f.debug_struct("SubmissionSession")
            .field("id", &self.id)
            .field("records", &self.records)
            .field("min_delay", &self.min_delay)
            .field("state", &slot.state)
            .field("has_observer", &slot.observer.is_some())
            .finish()
    }
}
