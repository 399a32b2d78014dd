mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands, Settings, TOKEN_ENV};
use error::CliError;

mod cmd;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // .env до разбора аргументов: env-значения clap берутся оттуда же.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "cannot load .env");
        }
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = Settings::load(&cli.common, std::env::var(TOKEN_ENV).ok())?;
    match cli.command {
        Commands::Watch => cmd::watch::run(&settings).await,
        Commands::Backup(args) => cmd::backup::run(&settings, &args).await,
        Commands::Export(args) => cmd::export::run(&settings, &args).await,
        Commands::Annotate(args) => cmd::annotate::run(&settings, &args).await,
    }
}
