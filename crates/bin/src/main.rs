use std::process::ExitCode;

use clap::Parser;
use strongbox::{Config, Instance};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};

/// Build the configuration: file (if any), then environment, then flags.
fn load_config(cli: &Cli) -> Result<Config, strongbox::Error> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let instance = Instance::open(config).await?;

    match &cli.command {
        Commands::Init(args) => commands::init::run(&instance, args, cli.output).await,
        Commands::Health => commands::health::run(&instance, cli.output).await,
        Commands::Backups => commands::backups::run(&instance, cli.output).await,
        Commands::Migrate => commands::migrate::run(&instance, cli.output).await,
        Commands::Users => commands::users::run(&instance, cli.output).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr so JSON output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strongbox=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
