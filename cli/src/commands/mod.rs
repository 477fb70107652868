pub mod schedule;
pub mod services;
pub mod sync;
pub mod webview;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use service_sync::ServiceSyncConfig;
use service_sync::config::WebviewConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "servicedata",
    author,
    version,
    about = "Service data - reporting table sync and public service views",
    long_about = "Imports changed service documents into the reporting table and publishes the \
                  compact and extended views of visible services.\n\nConfiguration is read from \
                  APIM_*, DB_* and webview environment variables."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Import one document or an array of documents")]
    Sync(sync::SyncArgs),

    #[command(about = "Rebuild and publish the service views once")]
    Webview(webview::WebviewArgs),

    #[command(about = "Rebuild the service views on a schedule until interrupted")]
    Schedule(schedule::ScheduleArgs),

    #[command(about = "List an organization's services owned by one delegate")]
    Services(services::ServicesArgs)
}

/// Webview options shared by `webview` and `schedule`.
#[derive(clap::Args, Clone, Default)]
pub struct WebviewOverrides {
    /// Directory receiving the published views
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Rows fetched per cursor read
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>
}

impl WebviewOverrides {
    pub fn apply(&self, config: &mut WebviewConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size as usize;
        }
    }
}

pub fn load_config() -> Result<ServiceSyncConfig> {
    ServiceSyncConfig::from_env().context("Failed to load configuration from environment")
}
