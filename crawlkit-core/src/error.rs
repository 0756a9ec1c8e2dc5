//! Wire codec errors.

use thiserror::Error;

/// Error type for frame decoding.
///
/// Decoding a response never fails as a whole; these errors describe a single
/// frame that was skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Frame has no `:` separator.
    #[error("frame has no command separator")]
    MissingSeparator,

    /// Command name is empty or not printable ASCII.
    #[error("invalid command name: {0:?}")]
    InvalidCommand(String),

    /// Payload is not valid UTF-8 where text was expected.
    #[error("payload of '{0}' is not valid UTF-8")]
    InvalidUtf8(String),

    /// Payload could not be interpreted for its field.
    #[error("malformed '{field}' payload: {reason}")]
    MalformedField {
        /// Field (command) name.
        field: String,
        /// What went wrong.
        reason: String,
    },

    /// A required field was never received.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
}
