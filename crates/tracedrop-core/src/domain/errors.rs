//! Domain error types
//!
//! Errors raised while interpreting crash files and configuration values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// File name does not follow the `<package>-<version>-<id>.stacktrace` layout
    #[error("Invalid crash file name: {0}")]
    InvalidFileName(String),

    /// A crash file could not be read
    #[error("Unreadable crash file {file}: {reason}")]
    Unreadable {
        /// Name of the offending file
        file: String,
        /// Underlying I/O failure
        reason: String,
    },

    /// Collector URL is malformed or uses an unsupported scheme
    #[error("Invalid collector URL: {0}")]
    InvalidUrl(String),
}
