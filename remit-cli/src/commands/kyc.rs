//! Kyc command - queue identity documents for upload

use anyhow::{bail, Result};

use remit_core::LogEvent;

use crate::output;

use super::{get_context, get_logger, log_event};

pub fn run(uri: Option<&str>, mime: &str, list: bool, json: bool) -> Result<()> {
    let ctx = get_context(false)?;
    let user_id = ctx.config.user_id.clone();

    if list {
        let docs = ctx.kyc_service.documents(&user_id)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&docs)?);
            return Ok(());
        }
        if docs.is_empty() {
            output::info("No documents submitted yet.");
            return Ok(());
        }
        let mut table = output::create_table();
        table.set_header(vec!["Uploaded", "URI", "MIME", "Remote ID"]);
        for doc in &docs {
            table.add_row(vec![
                output::format_timestamp(doc.uploaded_at.timestamp_millis()),
                doc.uri.clone(),
                doc.mime.clone(),
                doc.remote_id.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        println!("{}", table);
        println!("KYC status: {}", ctx.kyc_service.status(&user_id)?.as_str());
        return Ok(());
    }

    let Some(uri) = uri else {
        bail!("Document URI required (or use --list)");
    };

    let logger = get_logger();
    let doc = ctx.kyc_service.submit_document(&user_id, uri, mime)?;

    log_event(
        &logger,
        LogEvent::new("kyc_doc_queued")
            .with_provider(ctx.remote.name())
            .with_command("kyc"),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    output::success(&format!("Document {} queued for upload", doc.id));
    Ok(())
}
