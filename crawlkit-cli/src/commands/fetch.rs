//! Fetch command - run a URL through a mode's chain.

use anyhow::Result;
use clap::Args;
use crawlkit_fetch::{DomainPolitenessCache, FetchOptions, Mode, Orchestrator, PageSource};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the fetch command.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// URL to fetch.
    pub url: String,

    /// Mode whose chain is walked (standard, headless, full).
    #[arg(long, short, default_value = "standard")]
    pub mode: Mode,

    /// Per-attempt timeout in seconds.
    #[arg(long, short)]
    pub timeout: Option<u64>,

    /// Check robots.txt first and refuse disallowed URLs.
    #[arg(long)]
    pub respect_robots: bool,

    /// Print the response body.
    #[arg(long, short)]
    pub body: bool,

    /// User agent override.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,

    /// Largest accepted body, in bytes.
    #[arg(long)]
    pub max_content_length: Option<u64>,
}

impl FetchArgs {
    /// Options for the orchestrator.
    pub fn options(&self) -> FetchOptions {
        let mut options = FetchOptions::new();
        if let Some(secs) = self.timeout {
            options = options.with_timeout(Duration::from_secs(secs.max(1)));
        }
        if let Some(user_agent) = &self.user_agent {
            options = options.with_user_agent(user_agent.clone());
        }
        if self.insecure {
            options = options.with_ssl_verify(false);
        }
        if let Some(limit) = self.max_content_length {
            options = options.with_max_content_length(limit);
        }
        options
    }
}

/// Runs the fetch command.
pub async fn run(args: &FetchArgs, cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let orchestrator = Orchestrator::new(config);

    if args.respect_robots {
        let source: Arc<dyn PageSource> = Arc::new(orchestrator.clone());
        let robots = DomainPolitenessCache::from_config(source, orchestrator.config());
        if !robots.is_allowed(&args.url).await {
            warn!(url = %args.url, "Disallowed by robots.txt");
            if !cli.quiet {
                eprintln!("{} is disallowed by robots.txt", args.url);
            }
            return Ok(ExitCode::Disallowed);
        }
    }

    info!(url = %args.url, mode = %args.mode, "Fetching");
    let outcome = orchestrator
        .orchestrate_detailed(&args.url, args.mode, &args.options())
        .await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_outcome(&outcome, args.body));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_outcome(&outcome, args.body)?);
        }
    }

    Ok(if outcome.is_success() {
        ExitCode::Success
    } else {
        ExitCode::FetchFailed
    })
}
