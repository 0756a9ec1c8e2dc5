//! Script entry point.
//!
//! The process side of the script protocol. `crawlkit crawl --url U
//! --output-file P --timeout S` runs one backend in-process and leaves the
//! encoded response in `P`, which makes the binary itself usable as a
//! [`ScriptBackend`](crate::backend::ScriptBackend) target.

use crawlkit_core::{FetchRequest, NormalizedResponse, SettingsMap, codec};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

use crate::backend::{self, BackendFactory, BackendKind};
use crate::config::EngineConfig;
use crate::error::FetchError;

/// One crawl run.
#[derive(Debug, Clone)]
pub struct CrawlJob {
    /// URL to fetch.
    pub url: String,
    /// Where the frame stream is written.
    pub output_file: PathBuf,
    /// Fetch timeout; `None` uses the backend's or the configured default.
    pub timeout: Option<Duration>,
    /// Backend name or kind; `None` selects plain HTTP.
    pub backend: Option<String>,
    /// Settings layered over the backend's own.
    pub settings: SettingsMap,
}

impl CrawlJob {
    /// Creates a job with default backend and timeout.
    pub fn new(url: impl Into<String>, output_file: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_file: output_file.into(),
            timeout: None,
            backend: None,
            settings: SettingsMap::new(),
        }
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Names the backend to run.
    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }
}

/// Runs the job and writes the encoded response to its output file.
///
/// The response is written even when the fetch failed, so the caller always
/// finds one in the file.
///
/// # Errors
///
/// Returns an error only if the output file cannot be written.
#[instrument(skip(config, factory, job), fields(url = %job.url, backend = ?job.backend))]
pub async fn run_crawl(
    config: &EngineConfig,
    factory: &dyn BackendFactory,
    job: &CrawlJob,
) -> Result<NormalizedResponse, FetchError> {
    let request = job_request(config, job);
    let response = backend::run_named(config, factory, &request, job.timeout, BackendKind::Script).await;
    write_output(&job.output_file, &response).await?;

    info!(
        status = response.status_code,
        path = %job.output_file.display(),
        "Wrote crawl output"
    );
    Ok(response)
}

async fn write_output(path: &std::path::Path, response: &NormalizedResponse) -> Result<(), FetchError> {
    tokio::fs::write(path, codec::encode_response(response)).await?;
    Ok(())
}

/// Request handed to the named backend for a job.
pub fn job_request(config: &EngineConfig, job: &CrawlJob) -> FetchRequest {
    let mut request = config.request_for(&job.url);
    request.backend.clone_from(&job.backend);
    request.settings.clone_from(&job.settings);
    request
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendDescriptor, FetchBackend};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FixedFactory;

    struct FixedBackend(String);

    #[async_trait]
    impl FetchBackend for FixedBackend {
        async fn fetch(&self, request: &FetchRequest, _timeout: Duration) -> NormalizedResponse {
            let mut response = NormalizedResponse::new(&request.url).with_status(200);
            response.headers.insert("Content-Type", "text/html");
            response.text = Some("<html>ok</html>".to_string());
            response.with_backend(&self.0)
        }
    }

    impl BackendFactory for FixedFactory {
        fn build(&self, descriptor: &BackendDescriptor) -> Box<dyn FetchBackend> {
            Box::new(FixedBackend(descriptor.name.clone()))
        }
    }

    #[tokio::test]
    async fn test_writes_decodable_output() {
        let dir = TempDir::new().unwrap();
        let job = CrawlJob::new("https://example.org/", dir.path().join("out.bin"))
            .with_timeout(Duration::from_secs(3));

        let response = run_crawl(&EngineConfig::default(), &FixedFactory, &job).await.unwrap();
        assert_eq!(response.backend.as_deref(), Some("requests"));

        let data = std::fs::read(&job.output_file).unwrap();
        let decoded = codec::decode_response(&data);
        assert_eq!(decoded.status_code, 200);
        assert_eq!(decoded.text.as_deref(), Some("<html>ok</html>"));
        assert_eq!(decoded.url, "https://example.org/");
    }

    #[tokio::test]
    async fn test_script_kind_is_refused_but_written() {
        let dir = TempDir::new().unwrap();
        let job = CrawlJob::new("https://example.org/", dir.path().join("out.bin")).with_backend("script");

        let response = run_crawl(&EngineConfig::default(), &FixedFactory, &job).await.unwrap();
        assert_eq!(response.status_code, 0);

        let decoded = codec::decode_response(&std::fs::read(&job.output_file).unwrap());
        assert!(decoded.errors[0].contains("call back into itself"));
    }

    #[tokio::test]
    async fn test_unwritable_output_is_error() {
        let dir = TempDir::new().unwrap();
        let job = CrawlJob::new("https://example.org/", dir.path().join("missing/out.bin"));
        let result = run_crawl(&EngineConfig::default(), &FixedFactory, &job).await;
        assert!(matches!(result, Err(FetchError::Io(_))));
    }

    #[test]
    fn test_job_request_carries_backend() {
        let job = CrawlJob::new("https://a/", "/tmp/x").with_backend("stealth");
        let request = job_request(&EngineConfig::default(), &job);
        assert_eq!(request.backend.as_deref(), Some("stealth"));
        assert!(request.ssl_verify);
    }
}
