//! Crawl command - the script entry point.
//!
//! Accepts the same arguments a script backend passes, so `crawlkit crawl`
//! can be configured as the `script` of a script backend.

use anyhow::{Result, bail};
use clap::Args;
use crawlkit_core::SettingsMap;
use crawlkit_fetch::{CrawlJob, StandardBackendFactory, run_crawl};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::{Cli, ExitCode};

/// Arguments for the crawl command.
#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// URL to fetch.
    #[arg(long)]
    pub url: String,

    /// File that receives the encoded response.
    #[arg(long)]
    pub output_file: PathBuf,

    /// Timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Backend name or kind to run (defaults to plain HTTP).
    #[arg(long, short)]
    pub backend: Option<String>,

    /// Backend setting as KEY=VALUE; VALUE is parsed as JSON when it can be.
    #[arg(long = "setting", short = 's', value_name = "KEY=VALUE")]
    pub settings: Vec<String>,
}

/// Runs the crawl command.
pub async fn run(args: &CrawlArgs, cli: &Cli) -> Result<ExitCode> {
    let config = Arc::new(cli.load_config()?);
    let factory = StandardBackendFactory::new(Arc::clone(&config));

    let mut job = CrawlJob::new(&args.url, &args.output_file);
    job.timeout = args.timeout.map(Duration::from_secs);
    job.backend.clone_from(&args.backend);
    job.settings = parse_settings(&args.settings)?;

    let response = run_crawl(&config, &factory, &job).await?;
    debug!(status = response.status_code, errors = ?response.errors, "Crawl finished");

    Ok(if response.is_valid() {
        ExitCode::Success
    } else {
        ExitCode::FetchFailed
    })
}

/// Parses `KEY=VALUE` pairs into a settings map.
pub fn parse_settings(pairs: &[String]) -> Result<SettingsMap> {
    let mut settings = SettingsMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid setting '{pair}', expected KEY=VALUE");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid setting '{pair}', empty key");
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        settings.insert(key.to_string(), value);
    }
    Ok(settings)
}
