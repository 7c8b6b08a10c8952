mod cli;
mod commands;
mod frontend;

use anyhow::Result;
use clap::Parser;
use sift_config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let load_config = || Config::load_from(&config_path);

    match cli.command {
        cli::Commands::Init { force } => commands::init::handle(&config_path, force),
        cli::Commands::Tasks => commands::classify::list_tasks(),
        cli::Commands::Classify(args) => commands::classify::handle(&load_config()?, args).await,
        cli::Commands::Columns { file } => commands::files::columns(&load_config()?, &file).await,
        cli::Commands::Combine { base, extra } => {
            commands::files::combine(&load_config()?, &base, &extra).await
        }
        cli::Commands::Concat { files } => commands::files::concat(&load_config()?, &files).await,
        cli::Commands::Divide { file, by } => {
            commands::files::divide(&load_config()?, &file, &by).await
        }
        cli::Commands::Cache(cmd) => commands::cache::handle(&load_config()?, cmd).await,
    }
}
