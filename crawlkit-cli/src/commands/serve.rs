//! Serve command - run the persistent fetch server.

use anyhow::{Context, Result};
use clap::Args;
use crawlkit_fetch::FetchServer;
use tracing::{info, warn};

use crate::{Cli, ExitCode};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8900;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind.
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

/// Runs the serve command until Ctrl-C.
pub async fn run(args: &ServeArgs, cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let addr = format!("{}:{}", args.host, args.port);

    let server = FetchServer::bind(addr.as_str(), config)
        .await
        .with_context(|| format!("binding {addr}"))?;
    let bound = server.local_addr()?;
    if !cli.quiet {
        eprintln!("Listening on {bound}");
    }

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted");
                shutdown.notify_one();
            }
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });

    server.serve().await;
    Ok(ExitCode::Success)
}
