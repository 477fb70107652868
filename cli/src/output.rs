use colored::Colorize;
use service_sync::{DomainError, SyncOutcome};
use service_sync::pipeline::SkipReason;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

fn skip_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::OrganizationOwner => "owned by an organization",
        SkipReason::SubscriptionNotFound => "no subscription"
    }
}

/// One line per document.
pub fn outcome(service_id: &str, outcome: &Result<SyncOutcome, DomainError>) {
    match outcome {
        Ok(SyncOutcome::Persisted { rows_affected: 0 }) => println!(
            "  {} {} {}",
            "=".dimmed(),
            service_id,
            "(stored version is newer or equal)".dimmed()
        ),
        Ok(SyncOutcome::Persisted { .. }) => println!("  {} {}", "✓".green(), service_id),
        Ok(SyncOutcome::Skipped { reason }) => println!(
            "  {} {} {}",
            "-".yellow(),
            service_id,
            format!("(skipped: {})", skip_label(*reason)).dimmed()
        ),
        Err(e) => println!("  {} {} {}", "✗".red(), service_id, e.to_string().red())
    }
}

pub fn summary(persisted: u32, skipped: u32, failed: u32) {
    let failed_text = failed.to_string();
    let failed_text = if failed > 0 {
        failed_text.red().bold()
    } else {
        failed_text.normal()
    };
    println!(
        "  {} persisted, {} skipped, {} failed",
        persisted.to_string().green(),
        skipped.to_string().yellow(),
        failed_text
    );
}
