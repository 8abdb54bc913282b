//! Remit CLI - offline-first remittances in your terminal

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{kyc, logs, send, status, sync};

/// Remit - offline-first remittances in your terminal
#[derive(Parser)]
#[command(name = "remit", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show transaction status and queue summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Queue a new remittance (signed after a confirmation challenge)
    Send {
        /// Amount to send (e.g. 100 or 99.50)
        amount: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// ISO 4217 currency of the amount
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Skip the interactive confirmation (non-interactive hosts)
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Queue an identity document for upload
    Kyc {
        /// Document URI (file path or content URI)
        uri: Option<String>,
        /// MIME type of the document
        #[arg(long, default_value = "image/jpeg")]
        mime: String,
        /// List queued and confirmed documents instead of submitting
        #[arg(long)]
        list: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drain the outbox against the remote provider
    Sync {
        /// Keep draining every N seconds (minimum 30)
        #[arg(long)]
        watch: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent engine events
    Logs {
        /// Only show events with errors
        #[arg(long)]
        errors: bool,
        /// Maximum entries to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Send {
            amount,
            to,
            currency,
            yes,
            json,
        } => send::run(&amount, &to, &currency, yes, json),
        Commands::Kyc {
            uri,
            mime,
            list,
            json,
        } => kyc::run(uri.as_deref(), &mime, list, json),
        Commands::Sync { watch, json } => sync::run(watch, json),
        Commands::Logs {
            errors,
            limit,
            json,
        } => logs::run(errors, limit, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}
