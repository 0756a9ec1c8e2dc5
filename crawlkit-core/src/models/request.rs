//! Fetch request handed to every backend.

use serde::{Deserialize, Serialize};

/// Opaque key→value settings map interpreted by a backend kind.
pub type SettingsMap = serde_json::Map<String, serde_json::Value>;

/// Default upper bound on accepted response size (10 MiB).
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 10 * 1024 * 1024;

/// What a backend needs to know about a fetch, besides its timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchRequest {
    /// URL to fetch.
    pub url: String,
    /// User agent override.
    pub user_agent: Option<String>,
    /// Whether TLS certificates are verified.
    pub ssl_verify: bool,
    /// Largest body the caller accepts, in bytes.
    pub max_content_length: u64,
    /// `Accept` header override.
    pub accept: Option<String>,
    /// Backend descriptor name, set when the request crosses a process boundary.
    pub backend: Option<String>,
    /// Backend settings forwarded across a process boundary.
    pub settings: SettingsMap,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            user_agent: None,
            ssl_verify: true,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            accept: None,
            backend: None,
            settings: SettingsMap::new(),
        }
    }
}

impl FetchRequest {
    /// Creates a request for the given URL with default options.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Enables or disables TLS verification.
    pub fn with_ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = verify;
        self
    }

    /// Sets the maximum accepted content length.
    pub fn with_max_content_length(mut self, bytes: u64) -> Self {
        self.max_content_length = bytes;
        self
    }

    /// Names the backend that should service this request remotely.
    pub fn with_backend(mut self, name: impl Into<String>, settings: SettingsMap) -> Self {
        self.backend = Some(name.into());
        self.settings = settings;
        self
    }
}
