//! Fetch error types.
//!
//! Backends never return these across the orchestrator boundary: every
//! failure is rendered with `Display` into `NormalizedResponse::errors`.
//! The enums exist so that each layer builds its messages the same way.

use crawlkit_core::CodecError;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("Network error: {0}")]
    Http(#[from] HttpError),

    /// Attempt exceeded its timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Body is larger than the configured maximum.
    #[error("Content error: {length} bytes exceeds limit of {limit} bytes")]
    ContentTooLarge {
        /// Declared or observed size.
        length: u64,
        /// Configured maximum.
        limit: u64,
    },

    /// Content type is missing or not textual.
    #[error("Content error: unsupported content type {0:?}")]
    UnsupportedContentType(Option<String>),

    /// A bot-protection service blocked the request.
    #[error("Protection detected: status {status} with '{header}' header, escalating to '{target}'")]
    ProtectionDetected {
        /// Blocking status code.
        status: u16,
        /// Signature header that was found.
        header: String,
        /// Backend escalated to.
        target: String,
    },

    /// Child process failed.
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Browser automation driver failed.
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Wire protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    /// Socket I/O failed.
    #[error("Socket error: {0}")]
    Socket(String),

    /// No enabled backend in the chain.
    #[error("No enabled backends configured for mode '{0}'")]
    NoBackends(String),

    /// Configuration problem.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Client could not be constructed.
    #[error("Client setup failed: {0}")]
    Build(String),
}

// ============================================================================
// Process Error
// ============================================================================

/// Error type for process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Process could not be started.
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    /// Command timed out and was killed.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// Non-zero exit and no usable output.
    #[error("Command exited with code {code}: {stderr}")]
    NonZeroExit {
        /// Exit code from the process.
        code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// Output file missing, empty or undecodable.
    #[error("Unreadable output: {0}")]
    UnreadableOutput(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Driver Error
// ============================================================================

/// Error type for browser automation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Driver executable not found.
    #[error("Driver not found: {0}")]
    NotFound(String),

    /// Driver did not come up.
    #[error("Driver launch failed: {0}")]
    Launch(String),

    /// WebDriver command returned an error.
    #[error("WebDriver '{command}' failed: {message}")]
    Command {
        /// Command path.
        command: String,
        /// Error message from the driver.
        message: String,
    },

    /// Transport to the driver failed.
    #[error("Driver transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Launch, navigation and page capture did not finish in time.
    #[error("Browser fetch timed out after {0:?}")]
    Timeout(Duration),
}

// ============================================================================
// Config Error
// ============================================================================

/// Error type for configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown mode name.
    #[error("Unknown mode: {0}")]
    InvalidMode(String),

    /// Unknown backend kind.
    #[error("Unknown backend kind: {0}")]
    InvalidBackendKind(String),

    /// Descriptor lookup failed.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Required setting missing.
    #[error("Backend '{backend}' requires setting '{setting}'")]
    MissingSetting {
        /// Backend name.
        backend: String,
        /// Setting key.
        setting: String,
    },

    /// Backend kind cannot be run by this entry point.
    #[error("Backend '{backend}' of kind '{kind}' cannot run here, it would call back into itself")]
    RecursiveBackend {
        /// Backend name.
        backend: String,
        /// Backend kind.
        kind: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
