//! Submission observer port
//!
//! The observer is usually owned by something short-lived, such as a
//! screen that shows a "please wait" indicator while crash reports upload.
//! It can be detached and a new one attached while a submission runs; see
//! the observer bridge in `tracedrop-submit`.
//!
//! ## Design Notes
//!
//! - `begin_submit` runs on the thread that requested the submission.
//! - `submit_done` runs on a background task, or on the thread calling
//!   `attach` when a finished submission is replayed. No lock is held while
//!   it runs, so it may call `attach` or `detach`.

/// Listener for submission lifecycle events
pub trait SubmitObserver: Send + Sync {
    /// Called before any upload starts. Returning `false` skips the upload
    /// and the claimed batch is dropped.
    fn begin_submit(&self) -> bool {
        true
    }

    /// Called once after every upload attempt finished and the minimum
    /// delay elapsed.
    fn submit_done(&self) {}

    /// Called once the crash hook has been installed during setup.
    fn handler_installed(&self) {}
}

/// Observer that accepts every submission and ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SubmitObserver for NoopObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_observer_proceeds() {
        let observer = NoopObserver;
        assert!(observer.begin_submit());
        observer.submit_done();
        observer.handler_installed();
    }
}
