//! Host lookup port (driven/secondary port)
//!
//! The embedding application knows its own package name and version, the
//! platform it runs on, and where it may store files. The pipeline asks
//! for this once at setup and caches the answer for the process lifetime.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity metadata stamped onto every crash file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Package (application) name, e.g. `com.example.app`
    pub package_name: String,
    /// Package version active in this process
    pub package_version: String,
    /// Operating system / platform version
    pub platform_version: String,
    /// Device or machine model identifier
    pub device_model: String,
    /// Directory holding pending crash files
    pub storage_dir: PathBuf,
}

impl HostInfo {
    /// Metadata with every identity field blank.
    ///
    /// Used when the lookup fails: crashes are still captured into
    /// `storage_dir`, just without identity.
    pub fn unknown(storage_dir: PathBuf) -> Self {
        Self {
            storage_dir,
            ..Self::default()
        }
    }
}

/// Port trait for resolving host metadata
///
/// Implementations may query a package manager, environment variables or
/// compile-time constants.
pub trait HostLookup: Send + Sync {
    /// Resolves the host metadata.
    fn lookup(&self) -> anyhow::Result<HostInfo>;
}

/// A fully known host answers with itself.
impl HostLookup for HostInfo {
    fn lookup(&self) -> anyhow::Result<HostInfo> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_keeps_only_storage_dir() {
        let info = HostInfo::unknown(PathBuf::from("/tmp/traces"));
        assert!(info.package_name.is_empty());
        assert!(info.package_version.is_empty());
        assert_eq!(info.storage_dir, PathBuf::from("/tmp/traces"));
    }

    #[test]
    fn test_host_info_looks_up_itself() {
        let info = HostInfo {
            package_name: "com.app".into(),
            package_version: "1.2".into(),
            platform_version: "linux 6.1".into(),
            device_model: "x86_64".into(),
            storage_dir: PathBuf::from("/tmp"),
        };
        assert_eq!(info.lookup().unwrap(), info);
    }
}
