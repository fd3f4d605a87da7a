//! Crash transport port (driven/secondary port)
//!
//! Delivers one crash record to the remote collector. The request carries
//! a URL-encoded form; the response body is ignored and only success or
//! failure is observed.

use serde::Serialize;

use crate::domain::CrashRecord;

/// Form fields of one upload request.
///
/// Field names are the wire names expected by collectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadForm {
    pub package_name: String,
    pub package_version: String,
    pub phone_model: String,
    pub android_version: String,
    pub stacktrace: String,
}

impl UploadForm {
    /// Builds the form for `record`, sent on behalf of `package_name`.
    pub fn from_record(package_name: &str, record: &CrashRecord) -> Self {
        Self {
            package_name: package_name.to_string(),
            package_version: record.app_version.clone(),
            phone_model: record.device_model.clone(),
            android_version: record.platform_version.clone(),
            stacktrace: record.trace.clone(),
        }
    }
}

/// Port trait for crash report delivery
///
/// Implementations must not retry on their own; a failed record is logged
/// by the caller and dropped.
#[async_trait::async_trait]
pub trait CrashTransport: Send + Sync {
    /// Sends one crash record.
    async fn send(&self, form: &UploadForm) -> anyhow::Result<()>;
}
