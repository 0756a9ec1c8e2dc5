// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # crawlkit Fetch
//!
//! Fetch backends and the escalating orchestrator.
//!
//! ## Host APIs
//!
//! The [`host`] module wraps the system pieces the backends drive:
//!
//! - [`host::http`] - HTTP client with user agent and TLS toggle
//! - [`host::process`] - Child processes in their own process group
//! - [`host::webdriver`] - WebDriver executable and sessions
//! - [`host::perflog`] - Status inference from browser performance logs
//! - [`host::socket`] - Frame-stream exchange over TCP
//!
//! ## Fetching
//!
//! - [`backend::FetchBackend`] - The one capability every backend provides
//! - [`chain::ModeChain`] - Ordered backends for a mode
//! - [`orchestrator::Orchestrator`] - Walks a chain, escalates and reorders
//! - [`robots::DomainPolitenessCache`] - Per-domain robots.txt decisions
//!
//! ## Entry Points
//!
//! - [`server::FetchServer`] - Runs backends for socket clients
//! - [`script::run_crawl`] - Runs one backend and writes its frame stream
//!
//! ## Example
//!
//! ```ignore
//! use crawlkit_fetch::{EngineConfig, FetchOptions, Mode, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(EngineConfig::load()?);
//! let response = orchestrator
//!     .orchestrate("https://example.com", Mode::Standard, &FetchOptions::new())
//!     .await;
//! println!("{} via {:?}", response.status_code, response.backend);
//! ```

// Core modules
pub mod backend;
pub mod chain;
pub mod config;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod robots;
pub mod script;
pub mod server;

// Re-export key types at crate root

// Errors
pub use error::{ConfigError, DriverError, FetchError, HttpError, ProcessError};

// Backends
pub use backend::{
    Backend, BackendDescriptor, BackendFactory, BackendKind, BrowserBackend, BrowserVariant,
    FetchBackend, HttpBackend, ScriptBackend, ServerBackend, StandardBackendFactory, run_named,
};

// Chains & orchestration
pub use chain::{Mode, ModeChain, ModeTable};
pub use config::EngineConfig;
pub use orchestrator::{
    AttemptOutcome, FetchAttempt, FetchOptions, FetchOutcome, Orchestrator, PageSource,
};

// Politeness
pub use robots::{DomainPolitenessCache, RobotsEntry};

// Entry points
pub use script::{CrawlJob, run_crawl};
pub use server::FetchServer;
