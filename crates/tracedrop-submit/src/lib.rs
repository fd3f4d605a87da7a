//! tracedrop Submit - Uploading claimed crash traces
//!
//! Provides:
//! - [`engine::SubmissionEngine`] - Uploads a batch off the caller's thread with a minimum duration
//! - [`session::SubmissionSession`] - Bookkeeping and observer slot for one upload attempt
//! - [`bridge::ObserverBridge`] - Rebindable attachment point between sessions and observers
//! - [`http::HttpTransport`] - `reqwest` implementation of the crash transport port

pub mod bridge;
pub mod engine;
pub mod http;
pub mod session;

pub use bridge::ObserverBridge;
pub use engine::SubmissionEngine;
pub use http::HttpTransport;
pub use session::{SessionState, Settlement, SubmissionSession};

use thiserror::Error;
use tracedrop_core::domain::DomainError;

/// Errors that can occur when delivering crash traces
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The collector URL is malformed
    #[error(transparent)]
    InvalidUrl(#[from] DomainError),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The collector answered with a non-success status
    #[error("Collector rejected crash trace with status {status}")]
    Rejected {
        /// HTTP status code returned by the collector
        status: u16,
    },
}
