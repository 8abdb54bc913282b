//! Status service - the read-only listing view
//!
//! Failures surface here: a transaction that the dispatcher resolved as
//! permanently failed shows up with status Failed and its error_text, with
//! no other user-visible signal.

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::{DuckDbRepository, StatusCounts};
use crate::domain::result::Result;
use crate::domain::Transaction;

/// Snapshot of local state for display
#[derive(Debug, Serialize)]
pub struct StatusSummary {
    /// All transactions, newest first
    pub transactions: Vec<Transaction>,
    pub counts: StatusCounts,
    /// Entries still awaiting remote confirmation
    pub outbox_depth: i64,
}

/// Read-only listing service
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    pub fn summary(&self) -> Result<StatusSummary> {
        Ok(StatusSummary {
            transactions: self.repository.get_transactions()?,
            counts: self.repository.count_by_status()?,
            outbox_depth: self.repository.outbox_len()?,
        })
    }

    pub fn transaction(&self, id: &str) -> Result<Option<Transaction>> {
        self.repository.get_transaction_by_id(id)
    }
}
