//! System host lookup
//!
//! Gathers non-identifying platform information for crash files.
//! Never includes hostname or username.

use std::path::PathBuf;

use anyhow::Context;
use tracedrop_core::ports::{HostInfo, HostLookup};

/// Host lookup for a native process.
///
/// The package name and version come from the embedding application; the
/// platform version and device model are read from the running system.
#[derive(Debug, Clone)]
pub struct SystemHost {
    package_name: String,
    package_version: String,
    storage_dir: Option<PathBuf>,
}

impl SystemHost {
    /// Creates a lookup for `package_name` at `package_version`.
    pub fn new(package_name: impl Into<String>, package_version: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            package_version: package_version.into(),
            storage_dir: None,
        }
    }

    /// Stores crash files in `dir` instead of the default data directory.
    pub fn with_storage_dir(mut self, dir: PathBuf) -> Self {
        self.storage_dir = Some(dir);
        self
    }

    /// Returns the default crash directory for `package_name`.
    ///
    /// Typically `$XDG_DATA_HOME/<package_name>/traces` on Linux.
    pub fn default_storage_dir(package_name: &str) -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join(package_name).join("traces"))
    }
}

impl HostLookup for SystemHost {
    fn lookup(&self) -> anyhow::Result<HostInfo> {
        let storage_dir = match self.storage_dir {
            Some(ref dir) => dir.clone(),
            None => Self::default_storage_dir(&self.package_name)
                .context("no local data directory available for crash files")?,
        };

        Ok(HostInfo {
            package_name: self.package_name.clone(),
            package_version: self.package_version.clone(),
            platform_version: platform_version(),
            device_model: device_model(),
            storage_dir,
        })
    }
}

fn platform_version() -> String {
    let kernel = read_kernel_version();
    if kernel.is_empty() {
        std::env::consts::OS.to_string()
    } else {
        format!("{} {}", std::env::consts::OS, kernel)
    }
}

fn read_kernel_version() -> String {
    std::fs::read_to_string("/proc/version")
        .ok()
        .and_then(|v| v.split_whitespace().nth(2).map(String::from))
        .unwrap_or_default()
}

fn device_model() -> String {
    std::fs::read_to_string("/sys/devices/virtual/dmi/id/product_name")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| std::env::consts::ARCH.to_string())
}
