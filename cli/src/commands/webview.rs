//! Webview command - one aggregation and publish run

use anyhow::{Context, Result};
use clap::Args;
use service_sync::{FileViewSink, PgReportingStore, ServiceSyncConfig, WebviewRefresher};
use std::sync::Arc;

use super::WebviewOverrides;
use crate::output;

#[derive(Args)]
pub struct WebviewArgs {
    #[command(flatten)]
    pub overrides: WebviewOverrides,

    /// Output the run report as JSON
    #[arg(long)]
    pub json: bool
}

pub async fn build_refresher(config: &ServiceSyncConfig) -> Result<WebviewRefresher> {
    let store = PgReportingStore::connect(&config.database)
        .await
        .context("Failed to connect to the reporting database")?;
    let sink = FileViewSink::new(config.webview.output_dir.clone());

    Ok(WebviewRefresher::new(
        Arc::new(store),
        Arc::new(sink),
        &config.table.table_ref(),
        &config.webview
    ))
}

pub async fn run(args: WebviewArgs) -> Result<()> {
    let mut config = super::load_config()?;
    args.overrides.apply(&mut config.webview);

    let refresher = build_refresher(&config).await?;
    let report = refresher.refresh().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::success(&format!(
            "Published {} services of {} organizations",
            report.services, report.organizations
        ));
    }
    Ok(())
}
