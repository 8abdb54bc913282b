//! Sync command - drain the outbox against the remote provider

use std::thread;
use std::time::Duration;

use anyhow::Result;

use remit_core::LogEvent;

use crate::output;

use super::{get_context, get_logger, log_event};

/// Floor for --watch so a tight loop can't hammer the provider
const MIN_WATCH_INTERVAL_SECS: u64 = 30;

pub fn run(watch: Option<u64>, json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context(false)?;

    match watch {
        None => drain_once(&ctx, &logger, json),
        Some(interval) => {
            let interval = interval.max(MIN_WATCH_INTERVAL_SECS);
            output::info(&format!("Draining every {}s (ctrl-c to stop)", interval));
            loop {
                drain_once(&ctx, &logger, json)?;
                thread::sleep(Duration::from_secs(interval));
            }
        }
    }
}

fn drain_once(
    ctx: &remit_core::RemitContext,
    logger: &Option<remit_core::LoggingService>,
    json: bool,
) -> Result<()> {
    if !ctx.sync_service.is_connected() {
        if !json {
            output::warning("Offline - skipping drain");
        }
        return Ok(());
    }

    match ctx.sync_service.trigger() {
        Ok(Some(report)) => {
            log_event(
                logger,
                LogEvent::new("sync_cycle_completed")
                    .with_provider(ctx.remote.name())
                    .with_command("sync"),
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            if report.dispatched == 0 {
                output::info("Outbox empty - nothing to sync");
            } else {
                println!(
                    "Dispatched {}: {} confirmed, {} left for retry, {} failed",
                    report.dispatched, report.resolved, report.retried, report.failed
                );
            }
            Ok(())
        }
        Ok(None) => {
            if !json {
                output::info("A drain is already running - coalesced");
            }
            Ok(())
        }
        Err(e) => {
            log_event(
                logger,
                LogEvent::new("sync_cycle_failed")
                    .with_command("sync")
                    .with_error(e.to_string()),
            );
            Err(e.into())
        }
    }
}
