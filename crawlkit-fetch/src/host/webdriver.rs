//! WebDriver executable and session.
//!
//! The driver (chromedriver or compatible) runs as a child process on a free
//! local port and is spoken to over the W3C WebDriver HTTP protocol. The
//! driver process lives in a [`ChildGuard`], so dropping [`DriverProcess`]
//! kills the driver and the browser it launched.

use reqwest::Client;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::perflog::LogEntry;
use super::process::{ChildGuard, ProcessRunner};
use crate::error::DriverError;

/// Executable searched on `PATH` when no driver path is configured.
pub const DEFAULT_DRIVER: &str = "chromedriver";

/// Time allowed for the driver to answer `/status`.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between `/status` polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Driver Process
// ============================================================================

/// A running WebDriver executable.
#[derive(Debug)]
pub struct DriverProcess {
    guard: ChildGuard,
    base_url: String,
    client: Client,
}

impl DriverProcess {
    /// Locates the driver executable.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NotFound`] if neither the configured path nor
    /// `chromedriver` on `PATH` exists.
    pub fn locate(configured: Option<&Path>) -> Result<PathBuf, DriverError> {
        let runner = ProcessRunner::new();
        let candidate = configured.map_or_else(
            || DEFAULT_DRIVER.to_string(),
            |path| path.display().to_string(),
        );
        runner
            .which(&candidate)
            .ok_or(DriverError::NotFound(candidate))
    }

    /// Starts the driver on a free port and waits until it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Launch`] if the process cannot be started or
    /// does not become ready in time.
    #[instrument(fields(driver = %driver.display()))]
    pub async fn launch(driver: &Path) -> Result<Self, DriverError> {
        let port = free_port().map_err(|e| DriverError::Launch(e.to_string()))?;

        let mut command = Command::new(driver);
        command
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        let guard =
            ChildGuard::spawn(&mut command).map_err(|e| DriverError::Launch(e.to_string()))?;

        let process = Self {
            guard,
            base_url: format!("http://127.0.0.1:{port}"),
            client,
        };
        process.wait_ready().await?;
        debug!(port, "Driver ready");
        Ok(process)
    }

    async fn wait_ready(&self) -> Result<(), DriverError> {
        let deadline = Instant::now() + LAUNCH_TIMEOUT;
        let status_url = format!("{}/status", self.base_url);

        loop {
            if let Ok(response) = self.client.get(&status_url).send().await {
                if let Ok(body) = response.json::<Value>().await {
                    if body["value"]["ready"].as_bool().unwrap_or(false) {
                        return Ok(());
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Launch(format!(
                    "driver not ready after {LAUNCH_TIMEOUT:?}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Base URL of the driver's HTTP endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Opens a browser session with the given capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the capabilities.
    pub async fn new_session(&self, capabilities: Value) -> Result<WebDriverSession, DriverError> {
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let url = format!("{}/session", self.base_url);
        let value = command(&self.client, reqwest::Method::POST, &url, Some(&body)).await?;
        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| DriverError::Command {
                command: "session".into(),
                message: "response has no sessionId".into(),
            })?
            .to_string();
        debug!(session = %id, "Session created");

        Ok(WebDriverSession {
            client: self.client.clone(),
            url: format!("{}/session/{id}", self.base_url),
            id,
        })
    }

    /// Kills the driver and its browser.
    pub async fn shutdown(mut self) {
        self.guard.kill().await;
    }
}

fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

// ============================================================================
// Session
// ============================================================================

/// An open WebDriver session.
#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    url: String,
    id: String,
}

impl WebDriverSession {
    /// Session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Navigates and waits for the page load the driver reports.
    ///
    /// # Errors
    ///
    /// Returns an error if navigation fails.
    pub async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.call(reqwest::Method::POST, "url", Some(&json!({ "url": url })))
            .await
            .map(|_| ())
    }

    /// URL currently shown.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver call fails.
    pub async fn current_url(&self) -> Result<String, DriverError> {
        let value = self.call(reqwest::Method::GET, "url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Serialized DOM of the current page.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver call fails.
    pub async fn page_source(&self) -> Result<String, DriverError> {
        let value = self.call(reqwest::Method::GET, "source", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Drains the performance log.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver call fails.
    pub async fn performance_log(&self) -> Result<Vec<LogEntry>, DriverError> {
        let value = self
            .call(reqwest::Method::POST, "se/log", Some(&json!({ "type": "performance" })))
            .await?;
        serde_json::from_value(value).map_err(|e| DriverError::Command {
            command: "se/log".into(),
            message: e.to_string(),
        })
    }

    /// Closes the session and its browser windows.
    pub async fn quit(self) {
        if let Err(e) = command(&self.client, reqwest::Method::DELETE, &self.url, None).await {
            warn!(session = %self.id, error = %e, "Failed to close session");
        }
    }

    async fn call(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, DriverError> {
        command(&self.client, method, &format!("{}/{path}", self.url), body).await
    }
}

/// Sends one WebDriver command and unwraps `value`.
async fn command(
    client: &Client,
    method: reqwest::Method,
    url: &str,
    body: Option<&Value>,
) -> Result<Value, DriverError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().await?;
    let status = response.status();
    let mut payload: Value = response.json().await?;
    let value = payload.get_mut("value").map(Value::take).unwrap_or_default();

    if status.is_success() {
        return Ok(value);
    }
    let message = value["message"]
        .as_str()
        .or_else(|| value["error"].as_str())
        .unwrap_or("unknown error")
        .to_string();
    Err(DriverError::Command {
        command: url.rsplit('/').next().unwrap_or(url).to_string(),
        message,
    })
}

// ============================================================================
// Tests
// ============================================================================
