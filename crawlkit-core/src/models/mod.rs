//! Domain models for crawlkit.
//!
//! ## Submodules
//!
//! - [`headers`] - Case-insensitive header map
//! - [`request`] - What a backend is asked to fetch
//! - [`response`] - The normalized fetch result and its classification
//! - [`protection`] - Bot-protection signatures

pub mod headers;
pub mod protection;
pub mod request;
pub mod response;

pub use headers::Headers;
pub use protection::{is_protected, protection_header};
pub use request::{DEFAULT_MAX_CONTENT_LENGTH, FetchRequest, SettingsMap};
pub use response::{DEFAULT_CONTENT_LENGTH, NormalizedResponse};
