//! Outbound client for the Postimages upload form.
//!
//! This module defines the `Upstream` trait to abstract the two network calls a relay request
//! can make, enabling testability with mock implementations. The production implementation,
//! [`PostimagesClient`], speaks to the real site via reqwest.

use async_trait::async_trait;
use reqwest::{header, multipart};
use std::path::Path;

use crate::config::UpstreamConfig;
use crate::errors::{Error, Result};

/// File field name expected by the site's upload form.
pub const UPLOAD_FIELD: &str = "upload[]";
/// Companion field signaling non-adult content.
pub const ADULT_FIELD: &str = "adult";
pub const ADULT_VALUE: &str = "no";

/// The two outbound calls a relay request can make against the image host.
///
/// Both return the raw response body text; interpreting it is the caller's problem. No retries
/// happen at this layer or above.
#[async_trait]
pub trait Upstream: Send + Sync + Clone + 'static {
    /// POST the spooled file to the host's upload form and return the HTML/text reply.
    ///
    /// # Errors
    /// Fails on transport errors and on non-2xx upstream statuses; both surface as
    /// [`Error::UpstreamTransport`].
    async fn submit_upload(&self, file: &Path, filename: &str) -> Result<String>;

    /// GET an individual page URL and return its HTML.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// Production client speaking to the real upload form.
#[derive(Clone)]
pub struct PostimagesClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl PostimagesClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Upstream for PostimagesClient {
    #[tracing::instrument(skip(self, file), fields(upload_url = %self.config.upload_url))]
    async fn submit_upload(&self, file: &Path, filename: &str) -> Result<String> {
        let bytes = tokio::fs::read(file).await.map_err(|err| {
            Error::Other(anyhow::anyhow!("failed to read spooled upload {}: {err}", file.display()))
        })?;

        let part = multipart::Part::bytes(bytes).file_name(filename.to_owned());
        let form = multipart::Form::new()
            .part(UPLOAD_FIELD, part)
            .text(ADULT_FIELD, ADULT_VALUE);

        let response = self
            .http
            .post(self.config.upload_url.as_str())
            .header(header::USER_AGENT, &self.config.user_agent)
            .multipart(form)
            .send()
            .await
            .map_err(Error::upstream)?
            .error_for_status()
            .map_err(Error::upstream)?;

        let body = response.text().await.map_err(Error::upstream)?;
        tracing::debug!(response_len = body.len(), "Upload form submitted");
        Ok(body)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .header(header::USER_AGENT, &self.config.user_agent)
            .send()
            .await
            .map_err(Error::upstream)?
            .error_for_status()
            .map_err(Error::upstream)?;

        response.text().await.map_err(Error::upstream)
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Scripted [`Upstream`] double for exercising the relay flow without a network.
///
/// Responses are configured up front; every call is recorded so tests can assert how many
/// outbound requests a flow made and with which page URLs.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct MockUpstream {
        inner: Arc<Mutex<Inner>>,
    }

    #[derive(Default)]
    struct Inner {
        upload_body: Option<String>,
        upload_error: Option<String>,
        page_body: Option<String>,
        page_error: Option<String>,
        upload_calls: usize,
        page_calls: Vec<String>,
    }

    impl MockUpstream {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_upload_body(self, body: &str) -> Self {
            self.inner.lock().unwrap().upload_body = Some(body.to_string());
            self
        }

        pub fn with_upload_error(self, detail: &str) -> Self {
            self.inner.lock().unwrap().upload_error = Some(detail.to_string());
            self
        }

        pub fn with_page_body(self, body: &str) -> Self {
            self.inner.lock().unwrap().page_body = Some(body.to_string());
            self
        }

        pub fn with_page_error(self, detail: &str) -> Self {
            self.inner.lock().unwrap().page_error = Some(detail.to_string());
            self
        }

        pub fn upload_calls(&self) -> usize {
            self.inner.lock().unwrap().upload_calls
        }

        pub fn page_calls(&self) -> Vec<String> {
            self.inner.lock().unwrap().page_calls.clone()
        }
    }

    #[async_trait]
    impl Upstream for MockUpstream {
        async fn submit_upload(&self, _file: &Path, _filename: &str) -> Result<String> {
            let mut inner = self.inner.lock().unwrap();
            inner.upload_calls += 1;

            if let Some(detail) = &inner.upload_error {
                return Err(Error::UpstreamTransport { detail: detail.clone() });
            }
            Ok(inner.upload_body.clone().expect("MockUpstream: no upload response scripted"))
        }

        async fn fetch_page(&self, url: &str) -> Result<String> {
            let mut inner = self.inner.lock().unwrap();
            inner.page_calls.push(url.to_string());

            if let Some(detail) = &inner.page_error {
                return Err(Error::UpstreamTransport { detail: detail.clone() });
            }
            Ok(inner.page_body.clone().expect("MockUpstream: no page response scripted"))
        }
    }
}
