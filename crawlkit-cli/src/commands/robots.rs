//! Robots command - show the robots.txt decision for a URL.

use anyhow::{Context, Result};
use clap::Args;
use crawlkit_fetch::{DomainPolitenessCache, Orchestrator, PageSource};
use std::sync::Arc;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the robots command.
#[derive(Args, Debug)]
pub struct RobotsArgs {
    /// URL whose domain is checked.
    pub url: String,

    /// Path to check instead of the URL's own path.
    #[arg(long, short)]
    pub path: Option<String>,
}

/// Runs the robots command.
pub async fn run(args: &RobotsArgs, cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let source: Arc<dyn PageSource> = Arc::new(Orchestrator::new(config.clone()));
    let cache = DomainPolitenessCache::from_config(source, &config);

    let entry = cache
        .get_domain_info(&args.url)
        .await
        .with_context(|| format!("checking robots.txt for {}", args.url))?;
    let path = args.path.clone().unwrap_or_else(|| url_path(&args.url));
    let allowed = entry.is_allowed(&path);

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_robots(&entry, &path, allowed));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_robots(&entry, &path, allowed)?);
        }
    }

    Ok(if allowed {
        ExitCode::Success
    } else {
        ExitCode::Disallowed
    })
}

/// Path and query of a URL, `/` when it has none.
fn url_path(url: &str) -> String {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = after_scheme.find('/').map_or("/", |i| &after_scheme[i..]);
    path.split('#').next().unwrap_or("/").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_path() {
        assert_eq!(url_path("https://example.org"), "/");
        assert_eq!(url_path("https://example.org/a/b?c=1#frag"), "/a/b?c=1");
        assert_eq!(url_path("https://example.org:8080/x"), "/x");
    }
}
