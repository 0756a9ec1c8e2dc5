//! Fetch backends.
//!
//! A backend is one concrete way of turning a URL into a
//! [`NormalizedResponse`]. Backends are a closed set ([`BackendKind`]); the
//! orchestrator only ever sees them through [`FetchBackend`], is told a
//! request and a timeout, and gets a response back. Backends never retry and
//! never fail with an error: failures are values in `errors`.

pub mod browser;
pub mod http;
pub mod script;
pub mod server;

use async_trait::async_trait;
use crawlkit_core::{FetchRequest, NormalizedResponse, SettingsMap};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{ConfigError, FetchError};

pub use browser::{BrowserBackend, BrowserVariant};
pub use http::HttpBackend;
pub use script::ScriptBackend;
pub use server::ServerBackend;

// ============================================================================
// Backend Kind
// ============================================================================

/// The kind of mechanism a backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Direct HTTP with a streaming GET.
    #[serde(alias = "requests")]
    Http,
    /// Headless browser automation.
    Headless,
    /// Full-window browser automation.
    Full,
    /// Headless browser with automation fingerprints suppressed.
    Stealth,
    /// External script process.
    Script,
    /// Persistent fetch server over TCP.
    Server,
}

impl BackendKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Headless => "Headless Browser",
            Self::Full => "Full Browser",
            Self::Stealth => "Stealth Browser",
            Self::Script => "Script",
            Self::Server => "Server",
        }
    }

    /// Config name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Headless => "headless",
            Self::Full => "full",
            Self::Stealth => "stealth",
            Self::Script => "script",
            Self::Server => "server",
        }
    }

    /// True for browser-automation kinds.
    pub fn is_browser(&self) -> bool {
        matches!(self, Self::Headless | Self::Full | Self::Stealth)
    }

    /// True for kinds that spawn expensive processes per fetch.
    pub fn is_heavy(&self) -> bool {
        self.is_browser() || *self == Self::Script
    }

    /// Returns all kinds.
    pub fn all() -> &'static [BackendKind] {
        &[
            Self::Http,
            Self::Headless,
            Self::Full,
            Self::Stealth,
            Self::Script,
            Self::Server,
        ]
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "requests" => Ok(Self::Http),
            "headless" => Ok(Self::Headless),
            "full" => Ok(Self::Full),
            "stealth" => Ok(Self::Stealth),
            "script" => Ok(Self::Script),
            "server" => Ok(Self::Server),
            other => Err(ConfigError::InvalidBackendKind(other.to_string())),
        }
    }
}

// ============================================================================
// Backend Descriptor
// ============================================================================

fn default_true() -> bool {
    true
}

/// A configured backend entry inside a mode chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique name within the chain (e.g. "requests", "headless").
    pub name: String,
    /// Mechanism used.
    pub kind: BackendKind,
    /// Kind-specific settings.
    #[serde(default)]
    pub settings: SettingsMap,
    /// Whether the orchestrator may use this entry.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl BackendDescriptor {
    /// Creates an enabled descriptor with no settings.
    pub fn new(name: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            name: name.into(),
            kind,
            settings: SettingsMap::new(),
            enabled: true,
        }
    }

    /// Adds a setting.
    #[must_use]
    pub fn with_setting(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    /// Marks the descriptor disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns a string setting.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(serde_json::Value::as_str)
    }

    /// Returns a numeric setting as seconds.
    pub fn setting_secs(&self, key: &str) -> Option<Duration> {
        let secs = self.settings.get(key)?.as_f64()?;
        (secs > 0.0).then(|| Duration::from_secs_f64(secs))
    }

    /// Per-attempt timeout override (`timeout`, in seconds).
    pub fn timeout(&self) -> Option<Duration> {
        self.setting_secs("timeout")
    }
}

// ============================================================================
// Fetch Backend Trait
// ============================================================================

/// The single capability every backend provides.
///
/// ## Implementing a Backend
///
/// ```ignore
/// struct StaticBackend;
///
/// #[async_trait]
/// impl FetchBackend for StaticBackend {
///     async fn fetch(&self, request: &FetchRequest, _timeout: Duration) -> NormalizedResponse {
///         NormalizedResponse::new(&request.url).with_status(200)
///     }
/// }
/// ```
#[async_trait]
pub trait FetchBackend: Send + Sync {
    /// Fetches the request, spending at most `timeout`.
    ///
    /// Must release every resource it acquired on all exit paths, including
    /// when the returned future is dropped.
    async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> NormalizedResponse;
}

// ============================================================================
// Backend
// ============================================================================

/// Closed set of concrete backends, one case per [`BackendKind`] family.
#[derive(Debug)]
pub enum Backend {
    /// Direct HTTP.
    Http(HttpBackend),
    /// Browser automation (headless, full, stealth).
    Browser(BrowserBackend),
    /// External script.
    Script(ScriptBackend),
    /// Persistent server.
    Server(ServerBackend),
}

impl Backend {
    /// Builds the concrete backend for a descriptor.
    pub fn from_descriptor(descriptor: &BackendDescriptor, config: &EngineConfig) -> Self {
        match descriptor.kind {
            BackendKind::Http => Self::Http(HttpBackend::new(descriptor, config)),
            BackendKind::Headless => {
                Self::Browser(BrowserBackend::new(BrowserVariant::Headless, descriptor, config))
            }
            BackendKind::Full => {
                Self::Browser(BrowserBackend::new(BrowserVariant::Full, descriptor, config))
            }
            BackendKind::Stealth => {
                Self::Browser(BrowserBackend::new(BrowserVariant::Stealth, descriptor, config))
            }
            BackendKind::Script => Self::Script(ScriptBackend::new(descriptor)),
            BackendKind::Server => Self::Server(ServerBackend::new(descriptor)),
        }
    }
}

#[async_trait]
impl FetchBackend for Backend {
    async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> NormalizedResponse {
        match self {
            Self::Http(backend) => backend.fetch(request, timeout).await,
            Self::Browser(backend) => backend.fetch(request, timeout).await,
            Self::Script(backend) => backend.fetch(request, timeout).await,
            Self::Server(backend) => backend.fetch(request, timeout).await,
        }
    }
}

// ============================================================================
// Backend Factory
// ============================================================================

/// Builds backends from descriptors.
///
/// The orchestrator asks the factory once per attempt, so backends hold no
/// state between fetches.
pub trait BackendFactory: Send + Sync {
    /// Returns the backend for a descriptor.
    fn build(&self, descriptor: &BackendDescriptor) -> Box<dyn FetchBackend>;
}

/// Factory producing the real [`Backend`] variants.
#[derive(Debug, Clone)]
pub struct StandardBackendFactory {
    config: Arc<EngineConfig>,
}

impl StandardBackendFactory {
    /// Creates a factory reading driver paths and defaults from `config`.
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }
}

impl BackendFactory for StandardBackendFactory {
    fn build(&self, descriptor: &BackendDescriptor) -> Box<dyn FetchBackend> {
        Box::new(Backend::from_descriptor(descriptor, &self.config))
    }
}

// ============================================================================
// Named Runs
// ============================================================================

/// Runs the backend a wire request names, for the server and script entry points.
///
/// Descriptors of kind `excluded` are refused: a server asked to run a server
/// backend, or a script asked to run a script backend, would recurse. The
/// timeout is the requested one, else the descriptor's, else the configured
/// default.
pub async fn run_named(
    config: &EngineConfig,
    factory: &dyn BackendFactory,
    request: &FetchRequest,
    timeout: Option<Duration>,
    excluded: BackendKind,
) -> NormalizedResponse {
    let descriptor = match resolve_runnable(config, request, excluded) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            warn!(error = %e, "Cannot run requested backend");
            return NormalizedResponse::failed(&request.url, FetchError::from(e).to_string());
        }
    };

    let timeout = timeout
        .or_else(|| descriptor.timeout())
        .unwrap_or_else(|| config.timeout());
    debug!(backend = %descriptor.name, kind = %descriptor.kind, ?timeout, "Running named backend");

    let mut local = request.clone();
    local.backend = None;
    local.settings = SettingsMap::new();
    factory.build(&descriptor).fetch(&local, timeout).await
}

fn resolve_runnable(
    config: &EngineConfig,
    request: &FetchRequest,
    excluded: BackendKind,
) -> Result<BackendDescriptor, ConfigError> {
    let descriptor = config.resolve_descriptor(request.backend.as_deref(), &request.settings)?;
    if descriptor.kind == excluded {
        return Err(ConfigError::RecursiveBackend {
            backend: descriptor.name,
            kind: descriptor.kind.to_string(),
        });
    }
    Ok(descriptor)
}

// ============================================================================
// Tests
// ============================================================================
