//! Handler error types.

use thiserror::Error;

/// Errors from URL classification and handler construction.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Handler kind name not recognized.
    #[error("Unknown handler kind: {0}")]
    UnknownKind(String),
}
