//! Engine configuration.
//!
//! Loaded from JSON, falling back to defaults when the file does not exist.
//! The configuration is an explicit value handed to the orchestrator; nothing
//! in the library reads a global.

use crawlkit_core::{DEFAULT_MAX_CONTENT_LENGTH, FetchRequest, SettingsMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::{BackendDescriptor, BackendKind};
use crate::chain::{Mode, ModeChain};
use crate::error::ConfigError;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent by the HTTP backend.
pub const DEFAULT_USER_AGENT: &str = concat!("crawlkit/", env!("CARGO_PKG_VERSION"));

/// Desktop user agent used by the stealth browser.
pub const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Agent token matched against robots.txt `User-agent` lines.
pub const ROBOTS_AGENT: &str = "crawlkit";

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_content_length() -> u64 {
    DEFAULT_MAX_CONTENT_LENGTH
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_robots_capacity() -> usize {
    1000
}

fn default_robots_ttl_secs() -> u64 {
    24 * 60 * 60
}

// ============================================================================
// Engine Config
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-attempt timeout when a descriptor sets none.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Largest accepted body, in bytes.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: u64,
    /// Whether TLS certificates are verified.
    #[serde(default = "default_true")]
    pub ssl_verify: bool,
    /// User agent for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Concurrent heavy (browser/script) attempts; `None` means unbounded.
    #[serde(default)]
    pub max_heavy_backends: Option<usize>,
    /// Number of domains kept in the robots cache.
    #[serde(default = "default_robots_capacity")]
    pub robots_capacity: usize,
    /// Lifetime of a robots entry, in seconds.
    #[serde(default = "default_robots_ttl_secs")]
    pub robots_ttl_secs: u64,
    /// Path to the WebDriver executable; searched on `PATH` when unset.
    #[serde(default)]
    pub driver_path: Option<PathBuf>,
    /// Backend chains per mode.
    #[serde(default = "default_modes")]
    pub modes: BTreeMap<Mode, ModeChain>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            ssl_verify: true,
            user_agent: default_user_agent(),
            max_heavy_backends: None,
            robots_capacity: default_robots_capacity(),
            robots_ttl_secs: default_robots_ttl_secs(),
            driver_path: None,
            modes: default_modes(),
        }
    }
}

/// Built-in chains.
pub fn default_modes() -> BTreeMap<Mode, ModeChain> {
    let requests = || BackendDescriptor::new("requests", BackendKind::Http);
    let headless = || BackendDescriptor::new("headless", BackendKind::Headless);

    let mut modes = BTreeMap::new();
    modes.insert(
        Mode::Standard,
        ModeChain::new(vec![
            requests(),
            headless(),
            // Enabled once a `script` path is configured.
            BackendDescriptor::new("script", BackendKind::Script).disabled(),
        ]),
    );
    modes.insert(Mode::Headless, ModeChain::new(vec![headless(), requests()]));
    modes.insert(
        Mode::Full,
        ModeChain::new(vec![
            BackendDescriptor::new("full", BackendKind::Full),
            BackendDescriptor::new("stealth", BackendKind::Stealth),
            requests(),
        ]),
    );
    modes
}

impl EngineConfig {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crawlkit")
            .join("config.json")
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Default per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs.max(1))
    }

    /// Configured chain for a mode (empty if none).
    pub fn chain(&self, mode: Mode) -> ModeChain {
        self.modes.get(&mode).cloned().unwrap_or_default()
    }

    /// Builds the request the orchestrator hands to backends.
    pub fn request_for(&self, url: &str) -> FetchRequest {
        FetchRequest::new(url)
            .with_user_agent(self.user_agent.clone())
            .with_ssl_verify(self.ssl_verify)
            .with_max_content_length(self.max_content_length)
    }

    /// Resolves a backend by name for out-of-process entry points.
    ///
    /// The name is looked up across all chains first and then parsed as a
    /// backend kind; `None` selects plain HTTP. `overrides` are layered over
    /// the descriptor's own settings. The result is always enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownBackend`] if the name matches neither.
    pub fn resolve_descriptor(
        &self,
        name: Option<&str>,
        overrides: &SettingsMap,
    ) -> Result<BackendDescriptor, ConfigError> {
        let name = name.unwrap_or("requests");
        let found = self.modes.values().find_map(|chain| chain.get(name)).cloned();

        let mut descriptor = match found {
            Some(descriptor) => descriptor,
            None => {
                let kind = name
                    .parse::<BackendKind>()
                    .map_err(|_| ConfigError::UnknownBackend(name.to_string()))?;
                BackendDescriptor::new(name, kind)
            }
        };

        for (key, value) in overrides {
            descriptor.settings.insert(key.clone(), value.clone());
        }
        descriptor.enabled = true;
        Ok(descriptor)
    }

    /// Sets the default timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    /// Replaces the chain for one mode.
    #[must_use]
    pub fn with_chain(mut self, mode: Mode, chain: ModeChain) -> Self {
        self.modes.insert(mode, chain);
        self
    }

    /// Limits concurrent heavy attempts.
    #[must_use]
    pub fn with_max_heavy_backends(mut self, limit: usize) -> Self {
        self.max_heavy_backends = Some(limit);
        self
    }

    /// Sets the WebDriver executable.
    #[must_use]
    pub fn with_driver_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.driver_path = Some(path.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_chains() {
        let config = EngineConfig::default();
        assert_eq!(
            config.chain(Mode::Standard).names(),
            vec!["requests", "headless", "script"]
        );
        assert!(!config.chain(Mode::Standard).get("script").unwrap().enabled);
        assert_eq!(config.chain(Mode::Headless).names(), vec!["headless", "requests"]);
        assert_eq!(
            config.chain(Mode::Full).names(),
            vec!["full", "stealth", "requests"]
        );
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "default_timeout_secs": 5,
                "modes": {
                    "standard": [
                        {"name": "requests", "kind": "requests"},
                        {"name": "script", "kind": "script", "settings": {"script": "/opt/crawl.sh", "timeout": 60}}
                    ]
                }
            }"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_content_length, DEFAULT_MAX_CONTENT_LENGTH);
        assert!(config.ssl_verify);

        let chain = config.chain(Mode::Standard);
        let script = chain.get("script").unwrap();
        assert!(script.enabled);
        assert_eq!(script.setting_str("script"), Some("/opt/crawl.sh"));
        assert!(config.chain(Mode::Full).is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = EngineConfig::default().with_max_heavy_backends(2);
        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_resolve_descriptor() {
        let config = EngineConfig::default();

        let default = config.resolve_descriptor(None, &SettingsMap::new()).unwrap();
        assert_eq!(default.kind, BackendKind::Http);

        let mut overrides = SettingsMap::new();
        overrides.insert("script".into(), "/bin/true".into());
        let script = config.resolve_descriptor(Some("script"), &overrides).unwrap();
        assert!(script.enabled);
        assert_eq!(script.setting_str("script"), Some("/bin/true"));

        let by_kind = config.resolve_descriptor(Some("stealth"), &SettingsMap::new()).unwrap();
        assert_eq!(by_kind.kind, BackendKind::Stealth);

        assert!(config.resolve_descriptor(Some("nope"), &SettingsMap::new()).is_err());
    }

    #[test]
    fn test_request_for_carries_settings() {
        let config = EngineConfig::default();
        let request = config.request_for("https://example.org");
        assert_eq!(request.user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
        assert!(request.ssl_verify);
        assert_eq!(request.max_content_length, DEFAULT_MAX_CONTENT_LENGTH);
    }
}
