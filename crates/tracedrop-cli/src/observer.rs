//! Console observer printing submission progress

use tracedrop::SubmitObserver;
use tracing::debug;

use crate::output::{get_formatter, OutputFormat};

/// Prints a "please wait" line when a submission starts and a completion
/// line when it finishes.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleObserver {
    format: OutputFormat,
    quiet: bool,
}

impl ConsoleObserver {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }
}

impl SubmitObserver for ConsoleObserver {
    fn begin_submit(&self) -> bool {
        get_formatter(self.format, self.quiet).info("Sending crash reports, please wait...");
        true
    }

    fn submit_done(&self) {
        get_formatter(self.format, self.quiet).success("Crash reports sent");
    }

    fn handler_installed(&self) {
        debug!("Crash hook ready");
    }
}
