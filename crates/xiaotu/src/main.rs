mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::Context;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut resolved = config::resolve(&cli.global)?;
    if let Command::Watch(ref args) = cli.command {
        if let Some(secs) = args.interval {
            resolved.config.refresh_interval = Duration::from_secs(secs);
        }
    }

    let profile_name = resolved.profile_name.clone();
    let ctx = Context::new(resolved)?;

    tracing::debug!(command = ?cli.command, profile = %profile_name, "dispatching command");
    let result = commands::dispatch(cli.command, &ctx, &cli.global).await;

    // A fresh login or a rejected session both change what should be cached
    if let Err(e) = ctx.persist_session() {
        tracing::warn!(error = %e, "could not store session");
    }
    result.map_err(|e| e.for_profile(&profile_name))
}
