//! Sync command - imports changed service documents
//!
//! Reads one document or an array of documents, resolves the owner of each
//! subscription and upserts the delegate owned ones into the reporting
//! table. Every document gets its own outcome; the command fails when any
//! document failed.

use anyhow::{Context, Result, bail};
use clap::Args;
use service_sync::{
    BatchReport, ChangeSyncPipeline, DocumentBatch, IdentityResolver, PgReportingStore,
    create_apim_client
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::output;

#[derive(Args)]
pub struct SyncArgs {
    /// JSON file with a document or an array of documents; stdin when absent
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Output the batch report as JSON
    #[arg(long)]
    pub json: bool,

    /// Documents processed at once, overrides SYNC_CONCURRENCY
    #[arg(long)]
    pub concurrency: Option<usize>
}

pub fn parse_batch(raw: &str) -> Result<DocumentBatch> {
    serde_json::from_str(raw).context("Input is neither a service document nor an array of them")
}

fn read_input(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read stdin")?;
            Ok(raw)
        }
    }
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let batch = parse_batch(&read_input(args.input.as_ref())?)?;
    let config = super::load_config()?;

    let store = PgReportingStore::connect(&config.database)
        .await
        .context("Failed to connect to the reporting database")?;
    let client = create_apim_client(config.apim.clone())?;

    let pipeline = ChangeSyncPipeline::new(
        IdentityResolver::new(client),
        Arc::new(store),
        config.table.upsert_target()
    )
    .with_concurrency(args.concurrency.unwrap_or(config.concurrency));

    let report = pipeline.process_batch(batch).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.has_failures() {
        bail!("{} of {} documents failed", report.failed, report.results.len());
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    output::header("Service Sync");
    println!();
    for result in &report.results {
        output::outcome(&result.service_id, &result.outcome);
    }
    println!();
    output::summary(report.persisted, report.skipped, report.failed);
}
