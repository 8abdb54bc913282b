//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// The sync dispatcher classifies remote failures through this enum:
/// `TransientNetwork` keeps the outbox entry queued for a later cycle,
/// `TerminalRemote` resolves the entry as permanently failed.
#[derive(Error, Debug)]
pub enum Error {
    /// The device presence challenge was refused or cancelled.
    /// Surfaced to the caller before any row is written.
    #[error("Authentication denied")]
    AuthDenied,

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Rejected by remote provider: {0}")]
    TerminalRemote(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transient network error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientNetwork(msg.into())
    }

    /// Create a terminal remote error
    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::TerminalRemote(msg.into())
    }

    /// True if a later drain cycle may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    /// True if the remote collaborator rejected the mutation for good.
    pub fn is_terminal_remote(&self) -> bool {
        matches!(self, Self::TerminalRemote(_))
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::transient("timed out").is_transient());
        assert!(!Error::transient("timed out").is_terminal_remote());
        assert!(Error::terminal("invalid address").is_terminal_remote());
        assert!(!Error::AuthDenied.is_transient());
        assert!(!Error::storage("disk full").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = Error::TerminalRemote("quote expired".to_string());
        assert_eq!(err.to_string(), "Rejected by remote provider: quote expired");
        assert_eq!(Error::AuthDenied.to_string(), "Authentication denied");
    }
}
