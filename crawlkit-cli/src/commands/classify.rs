//! Classify command - show which site handler services URLs.

use anyhow::Result;
use clap::Args;
use crawlkit_fetch::{Mode, Orchestrator};
use crawlkit_handlers::{Handler, HandlerPage};
use futures::future::join_all;
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the classify command.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// URLs to classify.
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Also fetch each URL and extract its metadata.
    #[arg(long, short)]
    pub load: bool,

    /// Mode used when loading.
    #[arg(long, short, default_value = "standard")]
    pub mode: Mode,
}

/// Runs the classify command.
pub async fn run(args: &ClassifyArgs, cli: &Cli) -> Result<ExitCode> {
    let handlers = args
        .urls
        .iter()
        .map(|url| Handler::for_url(url))
        .collect::<Result<Vec<_>, _>>()?;

    let pages: Vec<Option<HandlerPage>> = if args.load {
        let orchestrator = Orchestrator::new(cli.load_config()?);
        info!(count = handlers.len(), mode = %args.mode, "Loading pages");
        join_all(handlers.iter().map(|h| h.load(&orchestrator, args.mode)))
            .await
            .into_iter()
            .map(Some)
            .collect()
    } else {
        handlers.iter().map(|_| None).collect()
    };

    let entries: Vec<(Handler, Option<HandlerPage>)> = handlers.into_iter().zip(pages).collect();
    let all_valid = entries
        .iter()
        .all(|(_, page)| page.as_ref().is_none_or(|p| p.response.is_valid()));

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let blocks: Vec<String> = entries
                .iter()
                .map(|(handler, page)| match page {
                    Some(page) => formatter.format_page(handler, page),
                    None => formatter.format_handler(handler),
                })
                .collect();
            println!("{}", blocks.join("\n\n"));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let output = match entries.as_slice() {
                [(handler, page)] => formatter.format_handler(handler, page.as_ref())?,
                _ => formatter.format_handlers(&entries)?,
            };
            println!("{output}");
        }
    }

    Ok(if all_valid {
        ExitCode::Success
    } else {
        ExitCode::FetchFailed
    })
}
