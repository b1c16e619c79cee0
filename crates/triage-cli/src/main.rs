//! `triage`: plan and score diagnostic triage runs from the command line

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use triage_copilot::CopilotConfig;

use crate::cli::Cli;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<CopilotConfig> {
    let mut config = match &cli.config {
        Some(path) => CopilotConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CopilotConfig::new(),
    };
    if let Some(dir) = &cli.templates {
        config = config.with_templates_dir(dir.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    tracing::debug!(templates = %config.templates.dir.display(), "Using template directory");
    commands::run(cli.command, &config).await
}
