//! Crash recording
//!
//! Installs a panic hook that writes one crash file per fault into the
//! crash directory, then hands the panic to whatever hook was installed
//! before it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracedrop_core::domain::{CrashFileName, CrashRecord};
use tracedrop_core::ports::HostInfo;
use tracing::{debug, info};
use uuid::Uuid;

/// Set once the crash hook has been installed in this process.
static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Writes crash files for unhandled panics.
#[derive(Debug, Clone)]
pub struct CrashRecorder {
    dir: PathBuf,
    host: Arc<HostInfo>,
}

impl CrashRecorder {
    /// Creates a recorder writing into `dir`, stamping files with `host`.
    pub fn new(dir: PathBuf, host: Arc<HostInfo>) -> Self {
        Self { dir, host }
    }

    /// Returns the crash directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns true once any recorder installed the hook in this process.
    pub fn is_installed() -> bool {
        HOOK_INSTALLED.load(Ordering::Acquire)
    }

    /// Installs the crash hook.
    ///
    /// Returns `false` without touching the hook when it is already
    /// installed, so repeated setup never stacks wrappers. The hook stays
    /// in place until the process exits.
    pub fn install(&self) -> bool {
        if HOOK_INSTALLED.swap(true, Ordering::AcqRel) {
            debug!("Crash hook already installed");
            return false;
        }

        let previous_hook = std::panic::take_hook();
        let dir = self.dir.clone();
        let host = Arc::clone(&self.host);

        std::panic::set_hook(Box::new(move |panic_info| {
            let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };

            let location = panic_info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_default();

            let backtrace = std::backtrace::Backtrace::force_capture().to_string();
            let trace = format_trace(&message, &location, &backtrace);

            // Recording must never keep the panic from reaching the previous hook.
            if let Err(e) = write_crash_file(&dir, &host, &trace) {
                eprintln!("Failed to save crash trace: {e}");
            }

            previous_hook(panic_info);
        }));

        info!(dir = %self.dir.display(), "Crash hook installed");
        true
    }
}

/// Writes a crash file for `trace` into `dir` and returns its path.
///
/// The file is written under a temporary name and renamed into place, so
/// a concurrent scan never sees a partial crash file.
pub fn write_crash_file(dir: &Path, host: &HostInfo, trace: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let name = CrashFileName::new(&host.package_name, &host.package_version, discriminator());
    let path = dir.join(name.to_string());
    let tmp_path = dir.join(format!(".{name}.tmp"));

    let body = CrashRecord::body(&host.platform_version, &host.device_model, trace);
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, &path)?;

    Ok(path)
}

/// Unique, hyphen-free suffix for one crash file.
fn discriminator() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().timestamp_millis(), &id[..8])
}

fn format_trace(message: &str, location: &str, backtrace: &str) -> String {
    let thread = std::thread::current();
    let thread_name = thread.name().unwrap_or("<unnamed>");

    let mut trace = if location.is_empty() {
        format!("thread '{thread_name}' panicked:\n{message}\n")
    } else {
        format!("thread '{thread_name}' panicked at {location}:\n{message}\n")
    };
    if !backtrace.is_empty() {
        trace.push_str("stack backtrace:\n");
        trace.push_str(backtrace);
        if !backtrace.ends_with('\n') {
            trace.push('\n');
        }
    }
    trace
}
