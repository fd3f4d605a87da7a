//! Pending trace storage
//!
//! Finds crash files in the crash directory, parses them into a
//! [`PendingBatch`] and deletes every file it saw, whether or not it could
//! be parsed. A scan result is cached until it is cleared or taken.
//! Temporary files left behind by a crash mid-write are removed once they
//! are old enough that no writer can still own them.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use tracedrop_core::domain::{
    is_crash_file, CrashRecord, DomainError, PendingBatch, CRASH_FILE_SUFFIX, DEFAULT_MAX_TRACES,
};
use tracing::{debug, error, warn};

/// Age after which an unfinished temporary crash file is considered abandoned.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60);

/// Manages the directory of pending crash files.
#[derive(Debug)]
pub struct TraceStore {
    dir: PathBuf,
    max_traces: usize,
    cached: Mutex<Option<PendingBatch>>,
}

impl TraceStore {
    /// Creates a store over `dir`.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            max_traces: DEFAULT_MAX_TRACES,
            cached: Mutex::new(None),
        }
    }

    /// Caps how many records one scan returns.
    pub fn with_max_traces(mut self, max_traces: usize) -> Self {
        self.max_traces = max_traces.max(1);
        self
    }

    /// Returns the crash directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the pending batch, scanning the directory on first use.
    ///
    /// Every crash file found by the scan is deleted, including those past
    /// the cap and those that fail to parse.
    pub fn scan(&self) -> PendingBatch {
        let mut cached = self.lock_cache();
        if let Some(ref batch) = *cached {
            return batch.clone();
        }

        match self.load() {
            Ok(batch) => {
                *cached = Some(batch.clone());
                batch
            }
            Err(e) => {
                error!(dir = %self.dir.display(), error = %e, "Failed to scan crash directory");
                PendingBatch::new()
            }
        }
    }

    /// Returns true if the pending batch is not empty.
    pub fn has_pending(&self) -> bool {
        !self.scan().is_empty()
    }

    /// Drops the cached batch. Files on disk are already gone.
    pub fn clear(&self) {
        *self.lock_cache() = None;
    }

    /// Hands the pending batch off and clears the cache.
    ///
    /// Callers probing the store afterwards see no pending work until a
    /// new crash file appears.
    pub fn take(&self) -> PendingBatch {
        let mut cached = self.lock_cache();
        if let Some(batch) = cached.take() {
            return batch;
        }

        self.load().unwrap_or_else(|e| {
            error!(dir = %self.dir.display(), error = %e, "Failed to scan crash directory");
            PendingBatch::new()
        })
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<PendingBatch>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> std::io::Result<PendingBatch> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            return Ok(PendingBatch::new());
        }

        debug!(dir = %self.dir.display(), "Looking for crash traces");

        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !path.is_file() {
                continue;
            }

            if is_crash_file(&name) {
                candidates.push(path);
            } else if is_temp_crash_file(&name) && is_stale(&entry) {
                remove_stale(&path);
            }
        }

        debug!(count = candidates.len(), "Found crash trace(s)");

        // Deletes every candidate when this scope ends, even on unwind.
        let _eviction = Eviction { paths: &candidates };

        let mut batch = PendingBatch::new();
        for path in &candidates {
            if batch.len() >= self.max_traces {
                break;
            }

            match read_record(path) {
                Ok(record) => {
                    debug!(
                        path = %path.display(),
                        version = %record.app_version,
                        "Loaded crash trace"
                    );
                    batch.push(record);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load crash trace");
                }
            }
        }

        Ok(batch)
    }
}

/// Matches the `.<crash file name>.tmp` names used while a crash file is written.
fn is_temp_crash_file(file_name: &str) -> bool {
    file_name.starts_with('.')
        && file_name
            .strip_suffix(".tmp")
            .is_some_and(|rest| rest.ends_with(CRASH_FILE_SUFFIX))
}

fn is_stale(entry: &std::fs::DirEntry) -> bool {
    entry
        .metadata()
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= STALE_TEMP_AGE)
}

fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed abandoned temporary crash file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary crash file");
        }
    }
}

fn read_record(path: &Path) -> Result<CrashRecord, DomainError> {
    let file_name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let file = File::open(path).map_err(|e| DomainError::Unreadable {
        file: file_name.clone(),
        reason: e.to_string(),
    })?;

    CrashRecord::parse(&file_name, BufReader::new(file))
}

struct Eviction<'a> {
    paths: &'a [PathBuf],
}

impl Drop for Eviction<'_> {
    fn drop(&mut self) {
        for path in self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Error deleting crash trace");
                }
            }
        }
    }
}
