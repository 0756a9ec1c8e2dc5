//! Modes command - list configured chains.

use anyhow::Result;
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the modes command.
pub fn run(cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    info!(modes = config.modes.len(), "Listing modes");

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_modes(&config.modes));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config.modes)?);
        }
    }

    Ok(ExitCode::Success)
}
