//! Direct HTTP backend.
//!
//! Streaming GET: headers are inspected before the body is read, and the
//! body read stops as soon as it passes the size limit. The orchestrator's
//! content gate then rejects what was kept.

use async_trait::async_trait;
use crawlkit_core::{FetchRequest, Headers, NormalizedResponse};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{BackendDescriptor, FetchBackend};
use crate::config::EngineConfig;
use crate::error::{FetchError, HttpError};
use crate::host::HttpClient;

/// Default `Accept` header.
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Fetches with a plain HTTP client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    name: String,
    user_agent: String,
}

impl HttpBackend {
    /// Creates the backend from its descriptor (`user_agent` setting optional).
    pub fn new(descriptor: &BackendDescriptor, config: &EngineConfig) -> Self {
        Self {
            name: descriptor.name.clone(),
            user_agent: descriptor
                .setting_str("user_agent")
                .map_or_else(|| config.user_agent.clone(), str::to_string),
        }
    }

    async fn fetch_inner(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Result<NormalizedResponse, FetchError> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .user_agent(request.user_agent.as_deref().unwrap_or(&self.user_agent))
            .ssl_verify(request.ssl_verify)
            .build()?;

        let accept = request.accept.as_deref().unwrap_or(DEFAULT_ACCEPT);
        let mut http = client.get(&request.url, Some(accept)).await?;

        let mut response = NormalizedResponse::new(&request.url);
        response.url = http.url().to_string();
        response.status_code = http.status().as_u16();
        response.headers = collect_headers(http.headers());

        let limit = request.max_content_length;
        if response.get_content_length() > limit || !response.is_content_type_supported() {
            debug!(
                content_length = response.get_content_length(),
                content_type = ?response.get_content_type(),
                "Skipping body"
            );
            return Ok(response);
        }

        let mut body = Vec::new();
        while let Some(chunk) = http.chunk().await.map_err(HttpError::from)? {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > limit {
                warn!(read = body.len(), limit, "Body exceeds limit, aborting read");
                break;
            }
        }

        response.body = Some(body);
        response.encoding = Some(
            response
                .get_content_type_charset()
                .unwrap_or_else(|| "utf-8".to_string()),
        );
        response.text = response.get_text().map(std::borrow::Cow::into_owned);
        Ok(response)
    }
}

#[async_trait]
impl FetchBackend for HttpBackend {
    #[instrument(skip(self, request), fields(backend = %self.name, url = %request.url))]
    async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> NormalizedResponse {
        match self.fetch_inner(request, timeout).await {
            Ok(response) => {
                debug!(status = response.status_code, "HTTP fetch completed");
                response.with_backend(&self.name)
            }
            Err(e) => {
                let e = classify(e, timeout);
                debug!(error = %e, "HTTP fetch failed");
                NormalizedResponse::failed(&request.url, e.to_string()).with_backend(&self.name)
            }
        }
    }
}

/// Folds reqwest timeouts into [`FetchError::Timeout`].
fn classify(error: FetchError, timeout: Duration) -> FetchError {
    match error {
        FetchError::Http(HttpError::Request(e)) if e.is_timeout() => FetchError::Timeout(timeout),
        other => other,
    }
}

/// Collects headers, joining repeated names with ", ".
fn collect_headers(map: &reqwest::header::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for name in map.keys() {
        let value = map
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        headers.insert(name.as_str(), value);
    }
    headers
}

// ============================================================================
// Tests
// ============================================================================
