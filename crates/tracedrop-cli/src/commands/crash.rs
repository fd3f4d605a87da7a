//! Crash command - Panic on purpose
//!
//! Installs only the crash hook (no scan, so pending traces stay on disk)
//! and then panics, leaving a trace for the next `tracedrop submit`.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracedrop::{Config, HostInfo, HostLookup, SystemHost};
use tracedrop_capture::CrashRecorder;
use tracing::{info, warn};

use crate::output::get_formatter;
use crate::{GlobalArgs, PACKAGE_NAME};

#[derive(Debug, Args)]
pub struct CrashCommand {
    /// Panic message recorded in the trace
    #[arg(long, default_value = "exception requested by user")]
    pub message: String,
}

impl CrashCommand {
    pub async fn execute(&self, args: &GlobalArgs) -> Result<()> {
        let formatter = get_formatter(args.format, args.quiet);
        let config = Config::load_or_default(&args.config_path);

        let host = resolve_host(&config)?;
        let dir = config
            .storage
            .dir
            .clone()
            .unwrap_or_else(|| host.storage_dir.clone());

        CrashRecorder::new(dir.clone(), Arc::new(host)).install();
        info!(dir = %dir.display(), "Crashing on request");
        formatter.warn(&format!("Crashing now, trace goes to {}", dir.display()));

        panic!("{}", self.message);
    }
}

fn resolve_host(config: &Config) -> Result<HostInfo> {
    let mut lookup = SystemHost::new(PACKAGE_NAME, env!("CARGO_PKG_VERSION"));
    if let Some(ref dir) = config.storage.dir {
        lookup = lookup.with_storage_dir(dir.clone());
    }

    lookup.lookup().or_else(|e| match config.storage.dir {
        Some(ref dir) => {
            warn!(error = %e, "Host lookup failed, using blank metadata");
            Ok(HostInfo::unknown(dir.clone()))
        }
        None => Err(e),
    })
}
