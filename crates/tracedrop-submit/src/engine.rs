//! SubmissionEngine - Uploads claimed crash traces in the background
//!
//! A submission runs as a tokio task. Every record in the batch is sent
//! once; a failed record is logged and skipped. The task then waits out
//! whatever is left of the minimum delay, so a progress indicator shown by
//! the observer does not flash, and finally settles its session.
//!
//! ## Lifecycle
//!
//! ```text
//! submit(batch) ──→ begin_submit() ──false──→ batch dropped
//!                        │ true
//!                        ▼
//!             [upload r1 .. rn] ──→ [sleep remaining delay] ──→ submit_done()
//!                                          ▲
//!                     cancel() / superseded┘ (interrupts, suppresses submit_done)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracedrop_core::domain::{CrashRecord, PendingBatch};
use tracedrop_core::ports::{CrashTransport, NoopObserver, SubmitObserver, UploadForm};
use tracing::{debug, info, warn, Instrument, Span};

use crate::bridge::ObserverBridge;
use crate::session::{Settlement, SubmissionSession};

/// Background uploader for pending crash traces
pub struct SubmissionEngine {
    transport: Arc<dyn CrashTransport>,
    package_name: String,
    min_delay: Duration,
    bridge: Arc<ObserverBridge>,
    latest: Mutex<Option<Arc<SubmissionSession>>>,
}

impl SubmissionEngine {
    /// Creates an engine sending through `transport` on behalf of `package_name`.
    pub fn new(
        transport: Arc<dyn CrashTransport>,
        package_name: impl Into<String>,
        min_delay: Duration,
    ) -> Self {
        Self {
            transport,
            package_name: package_name.into(),
            min_delay,
            bridge: Arc::new(ObserverBridge::new()),
            latest: Mutex::new(None),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn bridge(&self) -> &ObserverBridge {
        &self.bridge
    }

    /// Starts uploading `batch`.
    ///
    /// Returns `false` when the batch is empty; nothing else happens then.
    /// Otherwise `begin_submit` is called on the observer (the explicit one,
    /// else the one attached while idle) before this returns, and `true` is
    /// returned even when the observer declines.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, batch: PendingBatch, observer: Option<Arc<dyn SubmitObserver>>) -> bool {
        if batch.is_empty() {
            debug!("No crash traces to submit");
            return false;
        }

        let observer = observer
            .or_else(|| self.bridge.take_pending())
            .unwrap_or_else(|| Arc::new(NoopObserver));

        if !observer.begin_submit() {
            info!(count = batch.len(), "Observer declined submission, dropping crash traces");
            return true;
        }

        let records = batch.into_records();
        let session = Arc::new(SubmissionSession::new(records.len(), self.min_delay, observer));

        if let Some(previous) = self.bridge.begin(Arc::clone(&session)) {
            debug!(session = %previous.id(), "Superseding previous submission");
            previous.cancel();
        }
        *self.lock_latest() = Some(Arc::clone(&session));

        info!(
            session = %session.id(),
            count = records.len(),
            min_delay_ms = self.min_delay.as_millis() as u64,
            "Submitting crash traces"
        );

        let worker = Worker {
            session,
            transport: Arc::clone(&self.transport),
            bridge: Arc::clone(&self.bridge),
            package_name: self.package_name.clone(),
        };
        tokio::spawn(worker.run(records).instrument(Span::current()));

        true
    }

    /// Cancels the current submission.
    ///
    /// Uploads already under way finish, the minimum delay is cut short and
    /// no `submit_done` is delivered.
    pub fn cancel(&self) {
        let session = self.lock_latest().clone();
        if let Some(session) = session {
            if session.state().is_running() {
                info!(session = %session.id(), "Cancelling crash trace submission");
            }
            session.cancel();
            self.bridge.retire(&session);
        }
    }

    /// See [`ObserverBridge::attach`].
    pub fn attach(&self, observer: Arc<dyn SubmitObserver>) {
        self.bridge.attach(observer);
    }

    /// See [`ObserverBridge::detach`].
    pub fn detach(&self) {
        self.bridge.detach();
    }

    /// Returns true while the latest submission has not settled.
    pub fn is_active(&self) -> bool {
        self.lock_latest()
            .as_ref()
            .is_some_and(|session| session.state().is_running())
    }

    /// Returns the latest submission session, if any.
    pub fn latest(&self) -> Option<Arc<SubmissionSession>> {
        self.lock_latest().clone()
    }

    /// Resolves once the background task of the latest submission exited.
    pub async fn wait_idle(&self) {
        let session = self.lock_latest().clone();
        if let Some(session) = session {
            session.worker_finished().await;
        }
    }

    fn lock_latest(&self) -> MutexGuard<'_, Option<Arc<SubmissionSession>>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SubmissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionEngine")
            .field("package_name", &self.package_name)
            .field("min_delay", &self.min_delay)
            .field("bridge", &self.bridge)
            .finish()
    }
}

struct Worker {
    session: Arc<SubmissionSession>,
    transport: Arc<dyn CrashTransport>,
    bridge: Arc<ObserverBridge>,
    package_name: String,
}

impl Worker {
    async fn run(self, records: Vec<CrashRecord>) {
        let _finished = FinishedGuard(&self.session);
        let id = self.session.id();

        let mut failed = 0usize;
        for (index, record) in records.iter().enumerate() {
            let form = UploadForm::from_record(&self.package_name, record);
            match self.transport.send(&form).await {
                Ok(()) => debug!(session = %id, index, "Crash trace sent"),
                Err(e) => {
                    failed += 1;
                    warn!(session = %id, index, error = %e, "Failed to send crash trace");
                }
            }
        }

        let remaining = self.session.remaining_delay();
        if !remaining.is_zero() {
            debug!(
                session = %id,
                remaining_ms = remaining.as_millis() as u64,
                "Holding for minimum delay"
            );
            let cancel = self.session.cancellation().clone();
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = cancel.cancelled() => {
                    debug!(session = %id, "Minimum delay interrupted");
                }
            }
        }

        let sent = records.len() - failed;
        match self.session.settle() {
            Settlement::Delivered => {
                self.bridge.retire(&self.session);
                info!(session = %id, sent, failed, "Crash trace submission finished");
            }
            Settlement::Held => {
                info!(
                    session = %id,
                    sent,
                    failed,
                    "Crash trace submission finished while detached"
                );
            }
            Settlement::Suppressed => {
                self.bridge.retire(&self.session);
                debug!(session = %id, "Submission was cancelled, not notifying observer");
            }
        }
    }
}

struct FinishedGuard<'a>(&'a SubmissionSession);

impl Drop for FinishedGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_worker_finished();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};

    use tokio::time::Instant;

    use super::*;
    use crate::session::tests::CountingObserver;
    use crate::session::SessionState;

    /// In-memory transport recording every form it is handed
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<UploadForm>>,
        attempts: AtomicUsize,
        latency: Duration,
    }

    impl RecordingTransport {
        fn with_latency(latency: Duration) -> Self {
            Self {
                latency,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<UploadForm> {
            self.sent.lock().unwrap().clone()
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CrashTransport for RecordingTransport {
        async fn send(&self, form: &UploadForm) -> anyhow::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if form.stacktrace.contains("unreachable collector") {
                anyhow::bail!("connection refused");
            }
            self.sent.lock().unwrap().push(form.clone());
            Ok(())
        }
    }

    fn batch(traces: &[&str]) -> PendingBatch {
        traces
            .iter()
            .map(|t| CrashRecord::new("com.app", "5.1", "Pixel", *t))
            .collect::<Vec<_>>()
            .into()
    }

    fn engine(transport: &Arc<RecordingTransport>, min_delay_ms: u64) -> SubmissionEngine {
        let transport: Arc<dyn CrashTransport> = Arc::clone(transport) as Arc<dyn CrashTransport>;
        SubmissionEngine::new(transport, "com.app", Duration::from_millis(min_delay_ms))
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_noop() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 0);
        let observer = Arc::new(CountingObserver::default());

        assert!(!engine.submit(PendingBatch::new(), Some(observer.clone())));
        engine.wait_idle().await;

        assert_eq!(observer.begins(), 0);
        assert_eq!(observer.dones(), 0);
        assert_eq!(transport.attempts(), 0);
        assert!(engine.latest().is_none());
    }

    #[tokio::test]
    async fn test_submit_uploads_every_record_then_notifies_once() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 0);
        let observer = Arc::new(CountingObserver::default());

        assert!(engine.submit(batch(&["NPE\n", "OOM\n"]), Some(observer.clone())));
        assert_eq!(observer.begins(), 1, "begin_submit runs before submit returns");

        engine.wait_idle().await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].package_name, "com.app");
        assert_eq!(sent[0].phone_model, "Pixel");
        assert_eq!(sent[0].android_version, "5.1");
        assert_eq!(sent[0].stacktrace, "NPE\n");
        assert_eq!(observer.dones(), 1);
        assert!(!engine.is_active());
        assert_eq!(engine.latest().unwrap().state(), SessionState::Delivered);
    }

    #[tokio::test]
    async fn test_failed_record_does_not_abort_batch() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 0);
        let observer = Arc::new(CountingObserver::default());

        engine.submit(
            batch(&["first\n", "unreachable collector\n", "third\n"]),
            Some(observer.clone()),
        );
        engine.wait_idle().await;

        assert_eq!(transport.attempts(), 3);
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(observer.dones(), 1);
    }

    #[tokio::test]
    async fn test_declined_submission_drops_batch() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 0);
        let observer = Arc::new(CountingObserver::declining());

        assert!(engine.submit(batch(&["NPE\n"]), Some(observer.clone())));
        engine.wait_idle().await;

        assert_eq!(observer.begins(), 1);
        assert_eq!(observer.dones(), 0);
        assert_eq!(transport.attempts(), 0);
        assert!(!engine.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_delay_is_honoured() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 4000);
        let observer = Arc::new(CountingObserver::default());

        let start = Instant::now();
        engine.submit(batch(&["NPE\n"]), Some(observer.clone()));
        assert!(engine.is_active());
        engine.wait_idle().await;

        assert!(start.elapsed() >= Duration::from_millis(4000));
        assert_eq!(observer.dones(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_uploads_add_no_extra_delay() {
        let transport = Arc::new(RecordingTransport::with_latency(Duration::from_millis(3000)));
        let engine = engine(&transport, 4000);
        let observer = Arc::new(CountingObserver::default());

        let start = Instant::now();
        engine.submit(batch(&["a\n", "b\n"]), Some(observer.clone()));
        engine.wait_idle().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(6000));
        assert!(elapsed < Duration::from_millis(6100), "elapsed {elapsed:?}");
        assert_eq!(observer.dones(), 1);
    }

    #[tokio::test]
    async fn test_detach_then_attach_after_completion_replays_to_new_observer() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 0);
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());

        engine.attach(a.clone());
        engine.submit(batch(&["NPE\n"]), None);
        assert_eq!(a.begins(), 1);

        engine.detach();
        engine.wait_idle().await;
        assert_eq!(engine.latest().unwrap().state(), SessionState::Completed);

        engine.attach(b.clone());
        assert_eq!(b.dones(), 1);
        assert_eq!(a.dones(), 0);

        // The replay happens once.
        let c = Arc::new(CountingObserver::default());
        engine.attach(c.clone());
        assert_eq!(c.dones(), 0);
        assert_eq!(b.dones(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_while_running_replaces_observer() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 1000);
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());

        engine.submit(batch(&["NPE\n"]), Some(a.clone()));
        engine.attach(b.clone());
        engine.wait_idle().await;

        assert_eq!(a.dones(), 0);
        assert_eq!(b.dones(), 1);
        assert_eq!(b.begins(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_submission_supersedes_running_one() {
        let transport = Arc::new(RecordingTransport::with_latency(Duration::from_millis(100)));
        let engine = engine(&transport, 1000);
        let a = Arc::new(CountingObserver::default());
        let b = Arc::new(CountingObserver::default());

        engine.submit(batch(&["first\n"]), Some(a.clone()));
        let first = engine.latest().unwrap();
        engine.submit(batch(&["second\n"]), Some(b.clone()));

        first.worker_finished().await;
        engine.wait_idle().await;

        assert_eq!(first.state(), SessionState::Cancelled);
        assert_eq!(a.dones(), 0);
        assert_eq!(b.dones(), 1);
        // Claimed records are still uploaded.
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_delay_and_suppresses_done() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 5000);
        let observer = Arc::new(CountingObserver::default());

        let start = Instant::now();
        engine.submit(batch(&["NPE\n"]), Some(observer.clone()));
        engine.cancel();
        engine.wait_idle().await;

        assert!(start.elapsed() < Duration::from_millis(5000));
        assert_eq!(observer.dones(), 0);
        assert_eq!(transport.sent().len(), 1);
        assert!(!engine.is_active());
        assert!(engine.bridge().current().is_none());
    }

    #[tokio::test]
    async fn test_detach_and_cancel_while_idle_are_noops() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 0);

        engine.detach();
        engine.detach();
        engine.cancel();
        engine.wait_idle().await;
        assert!(!engine.is_active());
    }

    /// Observer that detaches, then re-attaches a follower, when notified
    struct ReattachingObserver {
        engine: OnceLock<Weak<SubmissionEngine>>,
        follower: Arc<CountingObserver>,
        dones: AtomicUsize,
    }

    impl ReattachingObserver {
        fn new(engine: &Arc<SubmissionEngine>) -> Arc<Self> {
            let observer = Arc::new(Self {
                engine: OnceLock::new(),
                follower: Arc::new(CountingObserver::default()),
                dones: AtomicUsize::new(0),
            });
            let _ = observer.engine.set(Arc::downgrade(engine));
            observer
        }
    }

    impl SubmitObserver for ReattachingObserver {
        fn submit_done(&self) {
            self.dones.fetch_add(1, Ordering::SeqCst);
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                engine.detach();
                engine.attach(self.follower.clone());
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_observer_may_detach_and_attach_from_submit_done() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = Arc::new(engine(&transport, 0));
        let observer = ReattachingObserver::new(&engine);

        engine.submit(batch(&["NPE\n"]), Some(observer.clone()));
        tokio::time::timeout(Duration::from_secs(5), engine.wait_idle())
            .await
            .expect("worker finished");

        assert_eq!(observer.dones.load(Ordering::SeqCst), 1);
        assert_eq!(engine.latest().unwrap().state(), SessionState::Delivered);
        assert!(!engine.is_active());
        // The session was already delivered, so the follower waits for the next one.
        assert_eq!(observer.follower.dones(), 0);
        assert!(engine.bridge().has_pending_observer());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replayed_observer_may_detach_from_submit_done() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = Arc::new(engine(&transport, 0));

        engine.submit(batch(&["NPE\n"]), None);
        engine.wait_idle().await;
        assert_eq!(engine.latest().unwrap().state(), SessionState::Completed);

        let observer = ReattachingObserver::new(&engine);
        let attaching = {
            let engine = Arc::clone(&engine);
            let observer = observer.clone();
            tokio::task::spawn_blocking(move || engine.attach(observer))
        };
        tokio::time::timeout(Duration::from_secs(5), attaching)
            .await
            .expect("attach returned")
            .unwrap();

        assert_eq!(observer.dones.load(Ordering::SeqCst), 1);
        assert_eq!(engine.latest().unwrap().state(), SessionState::Delivered);
        assert_eq!(observer.follower.dones(), 0);
    }

    #[tokio::test]
    async fn test_detach_does_not_cancel_uploads() {
        let transport = Arc::new(RecordingTransport::default());
        let engine = engine(&transport, 0);
        let observer = Arc::new(CountingObserver::default());

        engine.submit(batch(&["a\n", "b\n"]), Some(observer.clone()));
        engine.detach();
        engine.wait_idle().await;

        assert_eq!(transport.sent().len(), 2);
        assert_eq!(observer.dones(), 0);
    }
}
