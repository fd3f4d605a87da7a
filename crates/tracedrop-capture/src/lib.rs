//! tracedrop Capture - Crash recording and pending trace storage
//!
//! Provides:
//! - `CrashRecorder`: Process-wide panic hook writing one crash file per fault
//! - `TraceStore`: Scans, parses and evicts pending crash files
//! - `SystemHost`: Default host lookup built from the running system

pub mod host;
pub mod recorder;
pub mod store;

pub use host::SystemHost;
pub use recorder::{write_crash_file, CrashRecorder};
pub use store::TraceStore;
