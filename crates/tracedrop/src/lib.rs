//! tracedrop - Crash traces captured now, delivered on the next run
//!
//! A process that calls [`CrashReporter::setup`] early gets a panic hook
//! that writes every unhandled panic to a small file in a private
//! directory. The next time the process starts, setup finds those files,
//! deletes them and posts their contents to a collector in the background.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tracedrop::{ConfigBuilder, CrashReporter, NoopObserver, SystemHost};
//!
//! # async fn example() -> Result<(), tracedrop::ReporterError> {
//! let config = ConfigBuilder::new()
//!     .collector_url("https://crash.example.com/collect")
//!     .min_delay_ms(2000)
//!     .build();
//! let host = SystemHost::new("com.example.app", env!("CARGO_PKG_VERSION"));
//!
//! let reporter = CrashReporter::setup(config, &host, Arc::new(NoopObserver))?;
//! reporter.wait_idle().await;
//! # Ok(())
//! # }
//! ```
//!
//! The [`global`] module keeps one reporter for the whole process, for
//! hosts that cannot thread a handle through.

pub mod global;
pub mod reporter;

pub use reporter::CrashReporter;
pub use tracedrop_capture::SystemHost;
pub use tracedrop_core::config::{Config, ConfigBuilder, ValidationError};
pub use tracedrop_core::ports::{HostInfo, HostLookup, NoopObserver, SubmitObserver};
pub use tracedrop_submit::SubmitError;

use thiserror::Error;

/// Errors returned by the crash reporter
#[derive(Debug, Error)]
pub enum ReporterError {
    /// The configuration failed validation
    #[error("Invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),

    /// Pending traces exist but no collector URL is configured
    #[error("No collector URL configured")]
    MissingCollectorUrl,

    /// The transport could not be created
    #[error("Failed to create crash transport: {0}")]
    Transport(#[from] SubmitError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
