//! HTTP crash transport
//!
//! Posts each crash record to the collector as a URL-encoded form. The
//! response body is ignored; any non-2xx status counts as a failure.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tracedrop_core::config::parse_collector_url;
use tracedrop_core::ports::{CrashTransport, UploadForm};
use tracing::debug;
use url::Url;

use crate::SubmitError;

/// `reqwest` based [`CrashTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    /// Creates a transport posting to `url`.
    ///
    /// `timeout` bounds both connecting and the whole request; without it
    /// the `reqwest` defaults apply.
    pub fn new(url: &str, timeout: Option<Duration>) -> Result<Self, SubmitError> {
        let url = parse_collector_url(url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.connect_timeout(timeout).timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url,
        })
    }

    /// Returns the collector URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait::async_trait]
impl CrashTransport for HttpTransport {
    async fn send(&self, form: &UploadForm) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .form(form)
            .send()
            .await
            .map_err(SubmitError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
            }
            .into());
        }

        debug!(url = %self.url, status = status.as_u16(), "Collector accepted crash trace");
        Ok(())
    }
}
