//! CrashReporter - wires capture, storage and submission together
//!
//! Setup runs once per process, as early as possible:
//!
//! 1. Resolve host metadata (blank metadata if the lookup fails)
//! 2. Scan the crash directory for traces left by previous runs
//! 3. Install the crash hook
//! 4. Submit whatever the scan found

use std::path::PathBuf;
use std::sync::Arc;

use tracedrop_capture::{CrashRecorder, TraceStore};
use tracedrop_core::config::Config;
use tracedrop_core::ports::{CrashTransport, HostInfo, HostLookup, SubmitObserver};
use tracedrop_submit::{HttpTransport, SubmissionEngine};
use tracing::{debug, info, info_span, warn, Span};

use crate::ReporterError;

/// Handle to the crash pipeline of this process
pub struct CrashReporter {
    config: Config,
    host: Arc<HostInfo>,
    store: TraceStore,
    recorder: CrashRecorder,
    engine: Option<SubmissionEngine>,
    span: Span,
    submitted_on_setup: bool,
}

impl CrashReporter {
    /// Sets up crash reporting and submits traces left by previous runs.
    ///
    /// `observer` is told when the hook is installed and follows the
    /// submission started here, if any. Without a collector URL crashes are
    /// still recorded but nothing is sent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn setup(
        config: Config,
        host: &dyn HostLookup,
        observer: Arc<dyn SubmitObserver>,
    ) -> Result<Self, ReporterError> {
        validate(&config)?;
        let transport = match config.collector.url {
            Some(ref url) => {
                let http: Arc<dyn CrashTransport> =
                    Arc::new(HttpTransport::new(url, config.http_timeout())?);
                Some(http)
            }
            None => None,
        };
        Self::setup_with_transport(config, host, observer, transport)
    }

    /// Like [`CrashReporter::setup`], delivering through `transport`
    /// instead of HTTP.
    pub fn setup_with_transport(
        config: Config,
        host: &dyn HostLookup,
        observer: Arc<dyn SubmitObserver>,
        transport: Option<Arc<dyn CrashTransport>>,
    ) -> Result<Self, ReporterError> {
        validate(&config)?;

        let span = info_span!("tracedrop", tag = %config.logging.tag);
        let _enter = span.enter();

        let host = Arc::new(resolve_host(&config, host));
        if config.logging.verbose {
            info!(
                package = %host.package_name,
                version = %host.package_version,
                platform = %host.platform_version,
                model = %host.device_model,
                "Resolved host metadata"
            );
            info!(config = ?config, "Crash reporter configuration");
        }

        let dir = storage_dir(&config, &host);
        let store = TraceStore::new(dir.clone()).with_max_traces(config.submission.max_traces);
        let pending = store.scan();
        debug!(dir = %dir.display(), count = pending.len(), "Scanned crash directory");

        let recorder = CrashRecorder::new(dir, Arc::clone(&host));
        recorder.install();
        observer.handler_installed();

        let engine = match transport {
            Some(transport) => Some(SubmissionEngine::new(
                transport,
                host.package_name.clone(),
                config.min_delay(),
            )),
            None => {
                warn!("No collector URL configured, crash traces will not be submitted");
                None
            }
        };

        drop(_enter);

        let mut reporter = Self {
            config,
            host,
            store,
            recorder,
            engine,
            span,
            submitted_on_setup: false,
        };

        if reporter.engine.is_some() {
            reporter.submitted_on_setup = reporter.submit(Some(observer))?;
        }

        Ok(reporter)
    }

    /// Claims the pending traces and starts uploading them.
    ///
    /// Returns `Ok(false)` when there is nothing to send. With no explicit
    /// `observer` the one attached while idle (if any) is used.
    pub fn submit(&self, observer: Option<Arc<dyn SubmitObserver>>) -> Result<bool, ReporterError> {
        let _enter = self.span.enter();

        let Some(ref engine) = self.engine else {
            if self.store.has_pending() {
                return Err(ReporterError::MissingCollectorUrl);
            }
            return Ok(false);
        };

        Ok(engine.submit(self.store.take(), observer))
    }

    /// Submits with the observer attached while idle, if any.
    pub fn submit_default(&self) -> Result<bool, ReporterError> {
        self.submit(None)
    }

    /// Returns true if traces from previous runs are waiting.
    pub fn has_pending(&self) -> bool {
        self.store.has_pending()
    }

    /// Forgets the cached scan result.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Attaches `observer` to the running submission, or keeps it for the
    /// next one.
    pub fn attach(&self, observer: Arc<dyn SubmitObserver>) {
        match self.engine {
            Some(ref engine) => engine.attach(observer),
            None => debug!("No collector configured, observer ignored"),
        }
    }

    /// Detaches the current observer, e.g. when the object owning it is
    /// going away. Uploads continue.
    pub fn detach(&self) {
        if let Some(ref engine) = self.engine {
            engine.detach();
        }
    }

    /// Cancels the running submission without notifying its observer.
    pub fn cancel(&self) {
        if let Some(ref engine) = self.engine {
            engine.cancel();
        }
    }

    /// Returns true while a submission is running.
    pub fn is_submitting(&self) -> bool {
        self.engine.as_ref().is_some_and(SubmissionEngine::is_active)
    }

    /// Resolves once the latest submission's background task exited.
    pub async fn wait_idle(&self) {
        if let Some(ref engine) = self.engine {
            engine.wait_idle().await;
        }
    }

    /// Returns true if setup started a submission.
    pub fn submitted_on_setup(&self) -> bool {
        self.submitted_on_setup
    }

    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    pub fn recorder(&self) -> &CrashRecorder {
        &self.recorder
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for CrashReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashReporter")
            .field("host", &self.host)
            .field("store", &self.store.dir())
            .field("engine", &self.engine)
            .finish()
    }
}

fn validate(config: &Config) -> Result<(), ReporterError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ReporterError::InvalidConfig(errors))
    }
}

fn resolve_host(config: &Config, lookup: &dyn HostLookup) -> HostInfo {
    match lookup.lookup() {
        Ok(host) => host,
        Err(e) => {
            let dir = config
                .storage
                .dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("tracedrop"));
            warn!(error = %e, dir = %dir.display(), "Host lookup failed, using blank metadata");
            HostInfo::unknown(dir)
        }
    }
}

fn storage_dir(config: &Config, host: &HostInfo) -> PathBuf {
    config
        .storage
        .dir
        .clone()
        .unwrap_or_else(|| host.storage_dir.clone())
}
