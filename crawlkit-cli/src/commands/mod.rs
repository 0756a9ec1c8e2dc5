//! CLI command implementations.

pub mod classify;
pub mod config;
pub mod crawl;
pub mod fetch;
pub mod modes;
pub mod robots;
pub mod serve;
