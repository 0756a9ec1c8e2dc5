//! Persistent fetch server backend.
//!
//! Sends the request as a frame stream to a long-running server and decodes
//! the response stream it sends back. One request/response per connection.

use async_trait::async_trait;
use crawlkit_core::{FetchRequest, NormalizedResponse, SettingsMap, codec};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{BackendDescriptor, FetchBackend};
use crate::error::{ConfigError, FetchError};
use crate::host::socket;

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra read time beyond the remote timeout, so the server's own timeout
/// response still arrives. Kept below the orchestrator's attempt grace.
const READ_GRACE: Duration = Duration::from_secs(1);

/// Talks to a `crawlkit serve` compatible server.
#[derive(Debug, Clone)]
pub struct ServerBackend {
    name: String,
    host: String,
    port: Option<u16>,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    remote_backend: Option<String>,
    remote_settings: SettingsMap,
}

impl ServerBackend {
    /// Creates the backend from its descriptor.
    ///
    /// Settings: `port` (required), `host`, `connect_timeout`, `read_timeout`,
    /// and `backend`/`remote_settings` naming what the server should run.
    pub fn new(descriptor: &BackendDescriptor) -> Self {
        let port = descriptor
            .settings
            .get("port")
            .and_then(serde_json::Value::as_u64)
            .and_then(|p| u16::try_from(p).ok());

        Self {
            name: descriptor.name.clone(),
            host: descriptor.setting_str("host").unwrap_or(DEFAULT_HOST).to_string(),
            port,
            connect_timeout: descriptor
                .setting_secs("connect_timeout")
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: descriptor.setting_secs("read_timeout"),
            remote_backend: descriptor.setting_str("backend").map(str::to_string),
            remote_settings: descriptor
                .settings
                .get("remote_settings")
                .and_then(serde_json::Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Read timeout for a request the server runs under `timeout`.
    fn read_timeout(&self, timeout: Duration) -> Duration {
        self.read_timeout.unwrap_or(timeout + READ_GRACE)
    }

    async fn run(
        &self,
        request: &FetchRequest,
        timeout: Duration,
    ) -> Result<NormalizedResponse, FetchError> {
        let port = self.port.ok_or_else(|| ConfigError::MissingSetting {
            backend: self.name.clone(),
            setting: "port".to_string(),
        })?;
        let addr = format!("{}:{port}", self.host);

        let mut remote = request.clone();
        if let Some(backend) = &self.remote_backend {
            remote = remote.with_backend(backend.clone(), self.remote_settings.clone());
        }
        let message = codec::encode_request(&remote, timeout);

        let frames =
            socket::exchange(&addr, &message, self.connect_timeout, self.read_timeout(timeout)).await?;
        debug!(frames = frames.len(), "Received response frames");

        let mut response = codec::response_from_frames(frames);
        if response.url.is_empty() && response.status_code == 0 && response.errors.is_empty() {
            return Err(FetchError::Socket("server closed without a response".to_string()));
        }
        response.requested_url.clone_from(&request.url);
        Ok(response)
    }
}

#[async_trait]
impl FetchBackend for ServerBackend {
    #[instrument(skip(self, request), fields(backend = %self.name, url = %request.url))]
    async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> NormalizedResponse {
        match self.run(request, timeout).await {
            Ok(response) => response.with_backend(&self.name),
            Err(e) => {
                debug!(error = %e, "Server fetch failed");
                NormalizedResponse::failed(&request.url, e.to_string()).with_backend(&self.name)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
