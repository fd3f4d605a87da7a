//! Port definitions (trait interfaces)
//!
//! Ports connect the pipeline to collaborators it does not own:
//!
//! - [`host::HostLookup`] - Identity metadata and storage directory of the host process
//! - [`observer::SubmitObserver`] - Listener for submission lifecycle events
//! - [`transport::CrashTransport`] - Wire transport used to deliver one crash record

pub mod host;
pub mod observer;
pub mod transport;

pub use host::{HostInfo, HostLookup};
pub use observer::{NoopObserver, SubmitObserver};
pub use transport::{CrashTransport, UploadForm};
