//! Process-wide crash reporter
//!
//! For hosts that cannot keep a [`CrashReporter`] handle around. The first
//! [`setup`] creates the reporter; every other function panics if called
//! before it, since that is a bug in the embedding application.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracedrop_core::config::Config;
use tracedrop_core::ports::{HostLookup, SubmitObserver};

use crate::{CrashReporter, ReporterError};

static REPORTER: OnceLock<CrashReporter> = OnceLock::new();
static SETUP: Mutex<()> = Mutex::new(());

/// Sets up the process-wide reporter.
///
/// The first call behaves like [`CrashReporter::setup`] and returns whether
/// a submission started. Later calls only attach `observer` to the running
/// submission (replaying a completion it missed) and return `false`.
pub fn setup(
    config: Config,
    host: &dyn HostLookup,
    observer: Arc<dyn SubmitObserver>,
) -> Result<bool, ReporterError> {
    let _guard = SETUP.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(reporter) = REPORTER.get() {
        reporter.attach(observer);
        return Ok(false);
    }

    let reporter = CrashReporter::setup(config, host, observer)?;
    let submitted = reporter.submitted_on_setup();
    let _ = REPORTER.set(reporter);
    Ok(submitted)
}

/// Returns the reporter if [`setup`] succeeded.
pub fn get() -> Option<&'static CrashReporter> {
    REPORTER.get()
}

/// Returns true once [`setup`] succeeded.
pub fn is_initialized() -> bool {
    REPORTER.get().is_some()
}

/// See [`CrashReporter::submit`].
pub fn submit(observer: Option<Arc<dyn SubmitObserver>>) -> Result<bool, ReporterError> {
    reporter().submit(observer)
}

/// See [`CrashReporter::submit_default`].
pub fn submit_default() -> Result<bool, ReporterError> {
    reporter().submit_default()
}

/// See [`CrashReporter::has_pending`].
pub fn has_pending() -> bool {
    reporter().has_pending()
}

/// See [`CrashReporter::clear`].
pub fn clear() {
    reporter().clear();
}

/// See [`CrashReporter::attach`].
pub fn attach(observer: Arc<dyn SubmitObserver>) {
    reporter().attach(observer);
}

/// Tells the reporter the current observer is gone. Uploads continue.
pub fn notify_observer_gone() {
    reporter().detach();
}

/// See [`CrashReporter::cancel`].
pub fn cancel() {
    reporter().cancel();
}

fn reporter() -> &'static CrashReporter {
    match REPORTER.get() {
        Some(reporter) => reporter,
        None => panic!("tracedrop::global::setup must be called before using the crash reporter"),
    }
}
