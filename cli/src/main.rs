use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync(args) => commands::sync::run(args).await,
        Commands::Webview(args) => commands::webview::run(args).await,
        Commands::Schedule(args) => commands::schedule::run(args).await,
        Commands::Services(args) => commands::services::run(args).await
    }
}
