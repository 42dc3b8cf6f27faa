use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gainbook::cli::Cli;
use gainbook::config::TaxParameters;
use gainbook::dispatcher::dispatch_command;

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.no_color || cli.json {
        colored::control::set_override(false);
    }

    let params = TaxParameters::resolve(cli.params.as_deref())
        .context("Failed to load tax parameters")?;

    dispatch_command(cli.command, &params, cli.json)
}
