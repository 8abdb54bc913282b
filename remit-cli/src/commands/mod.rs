//! CLI command implementations

pub mod kyc;
pub mod logs;
pub mod send;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use remit_core::adapters::keystore::StaticPresence;
use remit_core::domain::result::Error;
use remit_core::ports::PresenceVerifier;
use remit_core::{EntryPoint, LogEvent, LoggingService, RemitContext};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let remit_dir = get_remit_dir();
    std::fs::create_dir_all(&remit_dir).ok()?;
    LoggingService::new(&remit_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the remit directory from environment or default
pub fn get_remit_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("REMIT_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .expect("Could not find home directory")
            .join(".remit")
    }
}

/// Interactive presence challenge backed by a terminal confirmation.
///
/// The desktop stand-in for the device biometric prompt: declining the
/// confirmation surfaces as an authentication denial, exactly like a
/// cancelled biometric sheet.
pub struct PromptPresence;

impl PresenceVerifier for PromptPresence {
    fn verify_presence(&self, reason: &str) -> remit_core::CoreResult<()> {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(reason)
            .default(false)
            .interact()
            .map_err(|_| Error::AuthDenied)?;
        if confirmed {
            Ok(())
        } else {
            Err(Error::AuthDenied)
        }
    }
}

/// Get or create a remit context
///
/// `interactive` selects the presence backend: the terminal confirmation for
/// a user at a keyboard, a static allow for scripted use (`--yes`) and
/// commands that never sign.
pub fn get_context(interactive: bool) -> Result<RemitContext> {
    let remit_dir = get_remit_dir();

    std::fs::create_dir_all(&remit_dir)
        .with_context(|| format!("Failed to create remit directory: {:?}", remit_dir))?;

    let presence: Arc<dyn PresenceVerifier> = if interactive {
        Arc::new(PromptPresence)
    } else {
        Arc::new(StaticPresence::allowing())
    };

    RemitContext::new(&remit_dir, presence).context("Failed to initialize remit context")
}
