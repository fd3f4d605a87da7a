//! Submit command - Send crash traces left by earlier runs
//!
//! Sets up the crash reporter the way an application would at startup,
//! then waits for the background submission to finish before exiting.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracedrop::{Config, CrashReporter, SystemHost};
use tracing::info;

use crate::observer::ConsoleObserver;
use crate::output::{get_formatter, OutputFormat};
use crate::{GlobalArgs, PACKAGE_NAME};

#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// Collector URL, overriding collector.url
    #[arg(long)]
    pub url: Option<String>,

    /// Minimum time the submission takes, in milliseconds
    #[arg(long)]
    pub min_delay_ms: Option<u64>,

    /// HTTP timeout per crash trace, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl SubmitCommand {
    pub async fn execute(&self, args: &GlobalArgs) -> Result<()> {
        let formatter = get_formatter(args.format, args.quiet);
        let config = self.apply(Config::load_or_default(&args.config_path));

        // Setup deletes what it scans, so refuse before scanning.
        if config.collector.url.is_none() {
            formatter.error("No collector URL configured");
            formatter.info("Pass --url or run 'tracedrop config set collector.url <url>'");
            return Ok(());
        }

        info!(config_path = %args.config_path.display(), "Submitting crash traces");

        let host = SystemHost::new(PACKAGE_NAME, env!("CARGO_PKG_VERSION"));
        let observer = Arc::new(ConsoleObserver::new(args.format, args.quiet));
        let reporter = CrashReporter::setup(config, &host, observer)
            .context("Failed to set up crash reporter")?;

        let submitted = reporter.submitted_on_setup();
        reporter.wait_idle().await;

        if matches!(args.format, OutputFormat::Json) {
            let json = serde_json::json!({
                "submitted": submitted,
                "package": reporter.host().package_name,
                "dir": reporter.store().dir().display().to_string(),
            });
            formatter.print_json(&json);
        } else if !submitted {
            formatter.success("No crash reports pending");
            formatter.info(&format!("Directory: {}", reporter.store().dir().display()));
        }

        Ok(())
    }

    fn apply(&self, mut config: Config) -> Config {
        if let Some(ref url) = self.url {
            config.collector.url = Some(url.clone());
        }
        if let Some(ms) = self.min_delay_ms {
            config.submission.min_delay_ms = ms;
        }
        if let Some(ms) = self.timeout_ms {
            config.collector.http_timeout_ms = Some(ms);
        }
        config
    }
}
