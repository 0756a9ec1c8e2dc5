//! Config command - manage configuration.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use crawlkit_fetch::EngineConfig;
use tracing::info;

use crate::output::JsonFormatter;
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,

    /// Show the configuration path.
    Path,

    /// Write the default configuration.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(cli)?,
        ConfigAction::Path => show_path(cli)?,
        ConfigAction::Init { force } => init_config(cli, *force)?,
    }
    Ok(ExitCode::Success)
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    // Text and JSON are the same document; text is always pretty.
    let formatter = JsonFormatter::new(cli.pretty || cli.format == OutputFormat::Text);
    println!("{}", formatter.format(&config)?);
    Ok(())
}

fn show_path(cli: &Cli) -> Result<()> {
    let path = cli.config_path();
    match cli.format {
        OutputFormat::Text => {
            let state = if path.exists() { "exists" } else { "not created" };
            println!("{} ({state})", path.display());
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!(
                "{}",
                formatter.format(&serde_json::json!({
                    "path": path.display().to_string(),
                    "exists": path.exists(),
                }))?
            );
        }
    }
    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = cli.config_path();
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    EngineConfig::default().save_to(&path)?;
    info!(path = %path.display(), "Wrote default configuration");
    if !cli.quiet {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli_for(path: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec!["crawlkit", "--quiet", "--config", path.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let cli = cli_for(&path, &["config", "init"]);

        init_config(&cli, false).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        let cli = cli_for(&path, &["config", "init"]);

        assert!(init_config(&cli, false).is_err());
        assert!(init_config(&cli, true).is_ok());
    }
}
