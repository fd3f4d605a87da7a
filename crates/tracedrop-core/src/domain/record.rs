//! Crash records and the on-disk crash file format
//!
//! A crash file is named `<package>-<version>-<discriminator>.stacktrace`
//! and its body is:
//!
//! ```text
//! <platform version>
//! <device model>
//! <trace line 1>
//! <trace line 2>
//! ...
//! ```

use std::fmt;
use std::io::BufRead;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Suffix shared by every crash file.
pub const CRASH_FILE_SUFFIX: &str = ".stacktrace";

/// Maximum number of records claimed by a single scan.
pub const DEFAULT_MAX_TRACES: usize = 5;

/// Returns true if `file_name` looks like a crash file.
pub fn is_crash_file(file_name: &str) -> bool {
    file_name.ends_with(CRASH_FILE_SUFFIX)
}

/// Extracts the version token from a crash file name.
///
/// This is the first `-` delimited segment of the name. For a name written
/// as `<package>-<version>-...` that segment is the package name, and a
/// package name containing `-` is cut short. Existing collectors rely on
/// this token, so it is kept as is.
pub fn version_token(file_name: &str) -> &str {
    file_name.split('-').next().unwrap_or(file_name)
}

/// Name of a crash file about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashFileName {
    package: String,
    version: String,
    discriminator: String,
}

impl CrashFileName {
    /// Creates a file name. The discriminator must be unique per fault.
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        discriminator: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            discriminator: discriminator.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }
}

impl fmt::Display for CrashFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}{}",
            self.package, self.version, self.discriminator, CRASH_FILE_SUFFIX
        )
    }
}

/// One persisted crash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// Version token taken from the file name
    pub app_version: String,
    /// First body line
    pub platform_version: String,
    /// Second body line
    pub device_model: String,
    /// Remaining body lines, each terminated by `\n`
    pub trace: String,
}

impl CrashRecord {
    /// Creates a record from its parts.
    pub fn new(
        app_version: impl Into<String>,
        platform_version: impl Into<String>,
        device_model: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Self {
            app_version: app_version.into(),
            platform_version: platform_version.into(),
            device_model: device_model.into(),
            trace: trace.into(),
        }
    }

    /// Parses a crash file body read from `reader`.
    ///
    /// Missing header lines are left empty rather than rejected.
    pub fn parse<R: BufRead>(file_name: &str, reader: R) -> Result<Self, DomainError> {
        if !is_crash_file(file_name) {
            return Err(DomainError::InvalidFileName(file_name.to_string()));
        }

        let mut platform_version: Option<String> = None;
        let mut device_model: Option<String> = None;
        let mut trace = String::new();

        for line in reader.lines() {
            let line = line.map_err(|e| DomainError::Unreadable {
                file: file_name.to_string(),
                reason: e.to_string(),
            })?;

            if platform_version.is_none() {
                platform_version = Some(line);
            } else if device_model.is_none() {
                device_model = Some(line);
            } else {
                trace.push_str(&line);
                trace.push('\n');
            }
        }

        Ok(Self {
            app_version: version_token(file_name).to_string(),
            platform_version: platform_version.unwrap_or_default(),
            device_model: device_model.unwrap_or_default(),
            trace,
        })
    }

    /// Renders the file body for this record's platform, model and trace.
    pub fn body(platform_version: &str, device_model: &str, trace: &str) -> String {
        let capacity = platform_version.len() + device_model.len() + trace.len() + 2;
        let mut body = String::with_capacity(capacity);
        body.push_str(platform_version);
        body.push('\n');
        body.push_str(device_model);
        body.push('\n');
        body.push_str(trace);
        body
    }
}

/// Ordered crash records claimed together by one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBatch {
    records: Vec<CrashRecord>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: CrashRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CrashRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CrashRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<CrashRecord> {
        self.records
    }
}

impl From<Vec<CrashRecord>> for PendingBatch {
    fn from(records: Vec<CrashRecord>) -> Self {
        Self { records }
    }
}

impl IntoIterator for PendingBatch {
    type Item = CrashRecord;
    type IntoIter = std::vec::IntoIter<CrashRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a PendingBatch {
    type Item = &'a CrashRecord;
    type IntoIter = std::slice::Iter<'a, CrashRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
