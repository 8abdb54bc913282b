//! Status command - transaction listing and queue summary

use anyhow::Result;
use colored::Colorize;

use crate::output;

use super::get_context;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context(false)?;
    let summary = ctx.status_service.summary()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.transactions.is_empty() {
        output::info("No transactions yet. Use 'remit send' to queue one.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec![
        "Created", "Amount", "To", "Status", "Remote ID", "Error",
    ]);
    for tx in &summary.transactions {
        table.add_row(vec![
            output::format_timestamp(tx.created_at.timestamp_millis()),
            format!("{} {}", tx.amount, tx.currency),
            tx.to_address.clone(),
            tx.status.as_str().to_string(),
            tx.remote_id.clone().unwrap_or_else(|| "-".to_string()),
            tx.error_text.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);

    println!();
    println!(
        "{} pending, {} completed, {} failed",
        summary.counts.pending(),
        summary.counts.completed,
        summary.counts.failed
    );
    if summary.outbox_depth > 0 {
        println!(
            "{}",
            format!("{} mutation(s) awaiting sync", summary.outbox_depth).yellow()
        );
    } else {
        output::success("Outbox empty - everything confirmed");
    }

    Ok(())
}
