// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! crawlkit CLI - adaptive web fetching from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Fetch a page through the standard chain
//! crawlkit fetch https://example.com
//!
//! # Start with a browser, print the body, honour robots.txt
//! crawlkit fetch https://example.com --mode headless --body --respect-robots
//!
//! # JSON output with every attempt
//! crawlkit --format json --pretty fetch https://example.com
//!
//! # Script entry point (used by script backends)
//! crawlkit crawl --url https://example.com --output-file out.bin --timeout 20
//!
//! # Persistent fetch server
//! crawlkit serve --port 8900
//!
//! # Site handlers
//! crawlkit classify https://www.youtube.com/channel/UC123 --load
//! ```

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crawlkit_fetch::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{classify, config, crawl, fetch, modes, robots, serve};

// ============================================================================
// CLI Definition
// ============================================================================

/// crawlkit CLI - adaptive web fetching.
#[derive(Parser)]
#[command(name = "crawlkit")]
#[command(about = "Adaptive web-fetching engine")]
#[command(long_about = r"
crawlkit fetches URLs through chains of backends (direct HTTP, headless,
full and stealth browsers, external scripts, fetch servers), escalating when
a site blocks plain HTTP and remembering which backend worked.

Modes:
  standard   requests -> headless -> script
  headless   headless -> requests
  full       full -> stealth -> requests

Examples:
  crawlkit fetch https://example.com
  crawlkit fetch https://example.com --mode full --body
  crawlkit robots https://example.com/private
  crawlkit serve --port 8900
")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the per-user config path).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

impl Cli {
    /// Loads the engine configuration from `--config` or the default path.
    pub fn load_config(&self) -> Result<EngineConfig> {
        let path = self.config.clone().unwrap_or_else(EngineConfig::default_path);
        EngineConfig::load_from(&path)
            .with_context(|| format!("loading configuration from {}", path.display()))
    }

    /// Path the configuration is read from.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(EngineConfig::default_path)
    }
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a URL through a mode's backend chain.
    #[command(visible_alias = "f")]
    Fetch(fetch::FetchArgs),

    /// Run one backend and write its frame stream to a file.
    Crawl(crawl::CrawlArgs),

    /// Run the persistent fetch server.
    Serve(serve::ServeArgs),

    /// Show the robots.txt decision for a URL.
    #[command(visible_alias = "r")]
    Robots(robots::RobotsArgs),

    /// Show which site handler services a URL.
    Classify(classify::ClassifyArgs),

    /// List configured mode chains.
    #[command(visible_alias = "m")]
    Modes,

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Every backend failed.
    FetchFailed = 2,
    /// robots.txt disallows the URL.
    Disallowed = 3,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("crawlkit=debug,info")
    } else {
        EnvFilter::new("crawlkit=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Fetch(args) => fetch::run(args, &cli).await,
        Commands::Crawl(args) => crawl::run(args, &cli).await,
        Commands::Serve(args) => serve::run(args, &cli).await,
        Commands::Robots(args) => robots::run(args, &cli).await,
        Commands::Classify(args) => classify::run(args, &cli).await,
        Commands::Modes => modes::run(&cli),
        Commands::Config(args) => config::run(args, &cli),
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
