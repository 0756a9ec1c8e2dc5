//! HTTP client with tracing, user agent and TLS toggle.

use reqwest::{Client, Response, header};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::error::HttpError;

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 10;

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Creates a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    /// Starts configuring a client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Performs a GET request. Only headers have been read when this returns.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid URLs and transport failures.
    #[instrument(skip(self, accept), fields(url = %url))]
    pub async fn get(&self, url: &str, accept: Option<&str>) -> Result<Response, HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        debug!("GET request");

        let mut builder = self.inner.get(parsed);
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }

        let response = builder.send().await?;
        debug!(status = %response.status(), final_url = %response.url(), "Response received");
        Ok(response)
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: String,
    ssl_verify: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ssl_verify: true,
        }
    }
}

impl HttpClientBuilder {
    /// Sets the whole-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enables or disables certificate verification.
    #[must_use]
    pub fn ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = verify;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] if the TLS backend cannot be initialized.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let inner = Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .danger_accept_invalid_certs(!self.ssl_verify)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(HttpClient { inner })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        assert!(HttpClient::new().is_ok());
        assert!(
            HttpClient::builder()
                .ssl_verify(false)
                .user_agent("test-agent")
                .timeout(Duration::from_secs(1))
                .build()
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let client = HttpClient::new().unwrap();
        let result = client.get("not a url", None).await;
        assert!(matches!(result, Err(HttpError::InvalidUrl(_))));
    }
}
