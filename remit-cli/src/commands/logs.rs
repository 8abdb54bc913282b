//! Logs command - show recent engine events

use anyhow::{anyhow, Result};

use crate::output;

use super::get_logger;

pub fn run(errors: bool, limit: usize, json: bool) -> Result<()> {
    let logger = get_logger().ok_or_else(|| anyhow!("Failed to open logs database"))?;

    let entries = if errors {
        logger.get_errors(limit)?
    } else {
        logger.get_recent(limit)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        output::info("No log entries.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Time", "Entry", "Event", "Provider", "Error"]);
    for entry in &entries {
        table.add_row(vec![
            output::format_timestamp(entry.timestamp),
            entry.entry_point.clone(),
            entry.event.clone(),
            entry.provider.clone().unwrap_or_default(),
            entry.error_message.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);

    Ok(())
}
