//! Schedule command - periodic webview refresh

use anyhow::{Context, Result};
use clap::Args;
use service_sync::WebviewScheduler;
use tracing::info;

use super::WebviewOverrides;
use super::webview::build_refresher;
use crate::output;

#[derive(Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub overrides: WebviewOverrides,

    /// Seconds between refreshes, overrides WEBVIEW_REFRESH_INTERVAL_SECONDS
    #[arg(long)]
    pub interval: Option<u64>,

    /// Refresh once before waiting for the first tick
    #[arg(long)]
    pub run_now: bool
}

pub async fn run(args: ScheduleArgs) -> Result<()> {
    let mut config = super::load_config()?;
    args.overrides.apply(&mut config.webview);
    if let Some(interval) = args.interval {
        config.webview.refresh_interval_seconds = interval;
    }

    let refresher = build_refresher(&config).await?;
    let mut scheduler = WebviewScheduler::new(refresher, &config.webview).await?;

    if args.run_now {
        match scheduler.run_now().await {
            Ok(report) => output::success(&format!(
                "Published {} services of {} organizations",
                report.services, report.organizations
            )),
            Err(e) => output::warn(&format!("Initial refresh failed: {}", e))
        }
    }

    scheduler.start().await?;
    output::info(&format!(
        "Refreshing every {}s, Ctrl+C to stop",
        scheduler.period().as_secs()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    scheduler.stop().await?;
    let history = scheduler.history().await;
    if let Some(report) = history.last_success {
        output::hint(&format!(
            "Last refresh completed at {}",
            report.completed_at.to_rfc3339()
        ));
    }
    if let Some(failure) = history.last_failure {
        output::warn(&format!(
            "Last failure at {}: {}",
            failure.at.to_rfc3339(),
            failure.error
        ));
    }
    if history.skipped_ticks > 0 {
        output::hint(&format!(
            "{} ticks skipped while a refresh was running",
            history.skipped_ticks
        ));
    }
    Ok(())
}
