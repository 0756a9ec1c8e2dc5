// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # crawlkit Handlers
//!
//! Site-aware dispatch on top of the fetch engine.
//!
//! - [`classifier::UrlClassifier`] - Ordered pattern table, first match wins
//! - [`handler::Handler`] - Code, fetch URL and metadata loading per kind
//! - [`html`] - Regex metadata extraction for pages and feeds
//!
//! ## Supported Sites
//!
//! | Kind | Code | Fetched URL |
//! |------|------|-------------|
//! | YouTube video | video id | watch page |
//! | YouTube channel | channel id or `@handle` | channel feed (or page for handles) |
//! | Odysee video | claim name | the page |
//! | Odysee channel | `@name` | channel feed |
//! | Reddit subreddit | subreddit | subreddit feed |
//! | Generic | none | the page |
//!
//! ## Usage
//!
//! ```ignore
//! use crawlkit_fetch::{EngineConfig, Mode, Orchestrator};
//! use crawlkit_handlers::Handler;
//!
//! let orchestrator = Orchestrator::new(EngineConfig::default());
//! let handler = Handler::for_url("https://www.youtube.com/channel/UC123")?;
//! let page = handler.load(&orchestrator, Mode::Standard).await;
//! println!("{:?}", page.properties.title);
//! ```

pub mod classifier;
pub mod error;
pub mod handler;
pub mod html;

pub use classifier::{HandlerKind, UrlClassifier, UrlPattern};
pub use error::HandlerError;
pub use handler::{Handler, HandlerPage};
pub use html::PageProperties;
