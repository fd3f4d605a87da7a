//! Domain entities
//!
//! This module contains the core domain types for tracedrop:
//! - Crash records and the batch claimed by one scan
//! - Crash file naming and body parsing
//! - Domain-specific error types

pub mod errors;
pub mod record;

// Re-export commonly used types
pub use errors::DomainError;
pub use record::{
    is_crash_file, version_token, CrashFileName, CrashRecord, PendingBatch, CRASH_FILE_SUFFIX,
    DEFAULT_MAX_TRACES,
};
