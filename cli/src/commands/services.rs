//! Services command - services of an organization owned by a delegate

use anyhow::{Context, Result};
use clap::Args;
use service_sync::{OrganizationFiscalCode, PgReportingStore, delegate_services};

use crate::output;

#[derive(Args)]
pub struct ServicesArgs {
    /// Email of the delegate owning the subscriptions
    #[arg(long)]
    pub delegate_email: String,

    /// Eleven-digit fiscal code of the organization
    #[arg(long)]
    pub fiscal_code: OrganizationFiscalCode,

    /// Output the services as JSON
    #[arg(long)]
    pub json: bool
}

pub async fn run(args: ServicesArgs) -> Result<()> {
    let config = super::load_config()?;
    let store = PgReportingStore::connect(&config.database)
        .await
        .context("Failed to connect to the reporting database")?;

    let services = delegate_services(
        &store,
        &config.table.table_ref(),
        &args.delegate_email,
        &args.fiscal_code,
        config.webview.page_size
    )
    .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&services)?);
        return Ok(());
    }

    output::header(&format!(
        "Services of {} owned by {}",
        args.fiscal_code, args.delegate_email
    ));
    if services.is_empty() {
        output::hint("No services found");
    }
    for service in &services {
        let visibility = if service.is_visible { "visible" } else { "hidden" };
        output::info(&format!("{} {} ({})", service.id, service.name, visibility));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ServicesArgs
    }

    #[test]
    fn test_parses_valid_fiscal_code() {
        let cli = TestCli::try_parse_from([
            "services",
            "--delegate-email",
            "test@test.com",
            "--fiscal-code",
            "12345678901",
        ])
        .unwrap();

        assert_eq!(cli.args.fiscal_code.as_str(), "12345678901");
        assert!(!cli.args.json);
    }

    #[test]
    fn test_rejects_malformed_fiscal_code() {
        let result = TestCli::try_parse_from([
            "services",
            "--delegate-email",
            "test@test.com",
            "--fiscal-code",
            "1234",
        ]);

        assert!(result.is_err());
    }
}
