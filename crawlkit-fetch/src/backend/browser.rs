//! Browser automation backends.
//!
//! Each fetch launches its own driver, opens one session, navigates, reads
//! the page and shuts everything down. The status code comes from the
//! driver's performance log since WebDriver itself does not report it.

use async_trait::async_trait;
use crawlkit_core::{FetchRequest, Headers, NormalizedResponse};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{BackendDescriptor, FetchBackend};
use crate::config::{EngineConfig, STEALTH_USER_AGENT};
use crate::error::{DriverError, FetchError};
use crate::host::perflog::{self, DocumentResponse};
use crate::host::{DriverProcess, WebDriverSession};

/// Headers that describe the wire encoding, not the page source we return.
const DROPPED_HEADERS: &[&str] = &["content-length", "content-encoding", "transfer-encoding"];

// ============================================================================
// Variant
// ============================================================================

/// Browser flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserVariant {
    /// No window.
    Headless,
    /// Real window.
    Full,
    /// Headless with automation fingerprints suppressed.
    Stealth,
}

impl BrowserVariant {
    /// WebDriver capabilities for this variant.
    pub fn capabilities(self, ssl_verify: bool, user_agent: Option<&str>) -> Value {
        let mut args = vec!["--disable-gpu".to_string(), "--no-sandbox".to_string()];
        let mut excluded: Vec<&str> = Vec::new();

        match self {
            Self::Headless => args.push("--headless=new".into()),
            Self::Full => {}
            Self::Stealth => {
                args.push("--headless=new".into());
                args.push("--disable-blink-features=AutomationControlled".into());
                excluded.push("enable-automation");
            }
        }

        let user_agent = match self {
            Self::Stealth => Some(user_agent.unwrap_or(STEALTH_USER_AGENT)),
            _ => user_agent,
        };
        if let Some(user_agent) = user_agent {
            args.push(format!("--user-agent={user_agent}"));
        }

        let mut chrome_options = json!({ "args": args });
        if !excluded.is_empty() {
            chrome_options["excludeSwitches"] = json!(excluded);
            chrome_options["useAutomationExtension"] = json!(false);
        }

        json!({
            "browserName": "chrome",
            "acceptInsecureCerts": !ssl_verify,
            "pageLoadStrategy": "normal",
            "goog:loggingPrefs": { "performance": "ALL" },
            "goog:chromeOptions": chrome_options,
        })
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Fetches through a WebDriver-controlled browser.
#[derive(Debug, Clone)]
pub struct BrowserBackend {
    name: String,
    variant: BrowserVariant,
    driver_path: Option<PathBuf>,
    user_agent: Option<String>,
}

impl BrowserBackend {
    /// Creates the backend. The `driver` setting overrides the configured driver path.
    pub fn new(variant: BrowserVariant, descriptor: &BackendDescriptor, config: &EngineConfig) -> Self {
        Self {
            name: descriptor.name.clone(),
            variant,
            driver_path: descriptor
                .setting_str("driver")
                .map(PathBuf::from)
                .or_else(|| config.driver_path.clone()),
            user_agent: descriptor.setting_str("user_agent").map(str::to_string),
        }
    }

    /// Variant in use.
    pub fn variant(&self) -> BrowserVariant {
        self.variant
    }

    async fn run(&self, request: &FetchRequest) -> Result<NormalizedResponse, FetchError> {
        let driver_path = DriverProcess::locate(self.driver_path.as_deref())?;
        let driver = DriverProcess::launch(&driver_path).await?;

        let capabilities = self
            .variant
            .capabilities(request.ssl_verify, self.user_agent.as_deref());
        let result = match driver.new_session(capabilities).await {
            Ok(session) => {
                let result = browse(&session, request).await;
                session.quit().await;
                result
            }
            Err(e) => Err(e),
        };

        driver.shutdown().await;
        result.map_err(FetchError::from)
    }
}

/// Navigates and builds the response from what the session shows.
async fn browse(
    session: &WebDriverSession,
    request: &FetchRequest,
) -> Result<NormalizedResponse, DriverError> {
    session.navigate(&request.url).await?;

    let source = session.page_source().await?;
    let final_url = session.current_url().await?;
    let log = match session.performance_log().await {
        Ok(log) => log,
        Err(e) => {
            warn!(error = %e, "Performance log unavailable, assuming 200");
            Vec::new()
        }
    };

    let document = perflog::last_html_response(&log);
    let mut response = NormalizedResponse::new(&request.url);
    response.url = if final_url.is_empty() {
        request.url.clone()
    } else {
        final_url
    };
    response.status_code = document.as_ref().map_or(perflog::DEFAULT_STATUS, |d| d.status);
    response.headers = page_headers(document);
    response.encoding = Some("utf-8".to_string());
    response.body = Some(source.clone().into_bytes());
    response.text = Some(source);
    Ok(response)
}

/// Document headers minus transfer framing, with a content type guaranteed.
fn page_headers(document: Option<DocumentResponse>) -> Headers {
    let mut headers = document.map(|d| d.headers).unwrap_or_default();
    for name in DROPPED_HEADERS {
        headers.remove(name);
    }
    if !headers.contains("content-type") {
        headers.insert("Content-Type", "text/html");
    }
    headers
}

#[async_trait]
impl FetchBackend for BrowserBackend {
    #[instrument(skip(self, request), fields(backend = %self.name, variant = ?self.variant, url = %request.url))]
    async fn fetch(&self, request: &FetchRequest, timeout: Duration) -> NormalizedResponse {
        // Dropping `run` on timeout drops the driver guard, which kills it.
        let result = match tokio::time::timeout(timeout, self.run(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Driver(DriverError::Timeout(timeout))),
        };

        match result {
            Ok(response) => {
                debug!(status = response.status_code, "Browser fetch completed");
                response.with_backend(&self.name)
            }
            Err(e) => {
                debug!(error = %e, "Browser fetch failed");
                NormalizedResponse::failed(&request.url, e.to_string()).with_backend(&self.name)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
