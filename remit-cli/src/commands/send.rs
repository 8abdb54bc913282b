//! Send command - queue a new remittance

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use remit_core::services::SendRequest;
use remit_core::{LogEvent, TxStatus};

use crate::output;

use super::{get_context, get_logger, log_event};

pub fn run(amount: &str, to: &str, currency: &str, yes: bool, json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context(!yes)?;

    let amount: Decimal = amount
        .parse()
        .with_context(|| format!("Invalid amount: {}", amount))?;

    let tx = ctx.send_service.send(SendRequest {
        user_id: ctx.config.user_id.clone(),
        amount,
        currency: currency.to_string(),
        to_address: to.to_string(),
    })?;

    log_event(
        &logger,
        LogEvent::new("send_queued")
            .with_provider(ctx.remote.name())
            .with_command("send"),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
        return Ok(());
    }

    match tx.status {
        TxStatus::QueuedOffline => {
            output::warning("Queued (offline) - will sync when connection resumes");
        }
        _ => {
            output::success("Queued (online) - syncing now");
            // Fast path: don't wait for the scheduler when we're online
            if let Some(report) = ctx.sync_service.trigger()? {
                if report.resolved > 0 {
                    output::success(&format!("Confirmed {} mutation(s)", report.resolved));
                }
                if report.failed > 0 {
                    output::error(&format!(
                        "{} mutation(s) permanently failed - see 'remit status'",
                        report.failed
                    ));
                }
            }
        }
    }
    println!("Transaction {}", tx.id);

    Ok(())
}
