// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # crawlkit Core
//!
//! Core types shared by every crawlkit crate.
//!
//! - [`NormalizedResponse`] - The canonical fetch result and its classification
//! - [`FetchRequest`] - What a backend is asked to fetch
//! - [`Headers`] - Case-insensitive header map
//! - [`codec`] - The `command:payload\0` wire format used between processes
//!
//! ## Example
//!
//! ```
//! use crawlkit_core::{codec, NormalizedResponse};
//!
//! let response = NormalizedResponse::new("https://example.com").with_status(200);
//! let bytes = codec::encode_response(&response);
//! assert_eq!(codec::decode_response(&bytes), response);
//! ```

pub mod codec;
pub mod error;
pub mod models;

// Re-export error types
pub use error::CodecError;

// Re-export model types
pub use models::{
    DEFAULT_CONTENT_LENGTH, DEFAULT_MAX_CONTENT_LENGTH, FetchRequest, Headers, NormalizedResponse,
    SettingsMap, is_protected, protection_header,
};
