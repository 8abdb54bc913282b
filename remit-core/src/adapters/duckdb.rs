//! DuckDB repository implementation
//!
//! The repository is the sole owner of all persisted state. Producers insert
//! entity+outbox pairs through the dual-write methods; the sync dispatcher is
//! the only caller of the resolve/fail/retry transitions. Every multi-row
//! mutation runs inside one BEGIN/COMMIT block so partial application is
//! structurally impossible.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use duckdb::{params, Connection};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{
    from_epoch_ms, to_epoch_ms, Entity, KycDocument, KycStatus, Op, OutboxEntry, Transaction,
    TxStatus, User,
};
use crate::services::migration::{MigrationResult, MigrationService};

/// Maximum number of retries when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB repository implementation
///
/// Holds the single physical connection for the process. All callers share
/// one instance through `Arc`; writes serialize through the inner mutex.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

/// Per-status transaction counts for the listing view
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatusCounts {
    pub created: i64,
    pub queued_offline: i64,
    pub submitted: i64,
    pub completed: i64,
    pub failed: i64,
}

impl StatusCounts {
    /// Transactions that still carry an unconfirmed mutation
    pub fn pending(&self) -> i64 {
        self.created + self.queued_offline + self.submitted
    }
}

impl DuckDbRepository {
    /// Create a new DuckDB repository
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when multiple processes touch the database at startup
    /// (e.g. an app shell and a scheduler invocation racing).
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[remit] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::storage(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Disable extension autoloading to avoid macOS code signing issues
        // (cached extensions in ~/.duckdb/extensions may have different Team IDs)
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)?;
        Ok(conn)
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn.lock().unwrap();
        let migration_service = MigrationService::new(&conn);
        migration_service
            .run_pending()
            .map_err(|e| Error::storage(e.to_string()))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Path of the underlying database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` inside one atomic transaction.
    ///
    /// Any error rolls the whole block back before propagating.
    fn with_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("BEGIN TRANSACTION")?;
        match f(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    // === Dual-writes (producer side) ===

    /// Insert a transaction row and its outbox entry as one atomic unit.
    ///
    /// No observer ever sees the entity row without its outbox counterpart
    /// mid-write, or vice versa.
    pub fn create_transaction_with_outbox(
        &self,
        tx: &Transaction,
        entry: &OutboxEntry,
    ) -> Result<()> {
        self.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO tx (id, user_id, amount, currency, rate, fee, to_address,
                                 status, created_at, last_attempt_at, remote_id,
                                 signed_payload, error_text)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    tx.id,
                    tx.user_id,
                    decimal_to_f64(tx.amount),
                    tx.currency,
                    decimal_to_f64(tx.rate),
                    decimal_to_f64(tx.fee),
                    tx.to_address,
                    tx.status.as_str(),
                    to_epoch_ms(tx.created_at),
                    tx.last_attempt_at.map(to_epoch_ms),
                    tx.remote_id,
                    tx.signed_payload,
                    tx.error_text,
                ],
            )?;
            Self::insert_outbox_row(conn, entry)?;
            Ok(())
        })
    }

    /// Insert a KYC document row and its outbox entry as one atomic unit
    pub fn create_kyc_doc_with_outbox(&self, doc: &KycDocument, entry: &OutboxEntry) -> Result<()> {
        self.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO kyc_docs (id, user_id, uri, mime, uploaded_at, remote_id)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    doc.id,
                    doc.user_id,
                    doc.uri,
                    doc.mime,
                    to_epoch_ms(doc.uploaded_at),
                    doc.remote_id,
                ],
            )?;
            Self::insert_outbox_row(conn, entry)?;
            Ok(())
        })
    }

    fn insert_outbox_row(conn: &Connection, entry: &OutboxEntry) -> Result<()> {
        conn.execute(
            "INSERT INTO outbox (id, entity, entity_id, op, payload_json, created_at, retry_count)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.id,
                entry.entity.as_str(),
                entry.entity_id,
                entry.op.as_str(),
                entry.payload_json,
                to_epoch_ms(entry.created_at),
                entry.retry_count,
            ],
        )?;
        Ok(())
    }

    // === Transaction reads ===

    const TX_COLUMNS: &'static str = "id, user_id, amount, currency, rate, fee, to_address, \
         status, created_at, last_attempt_at, remote_id, signed_payload, error_text";

    /// All transactions, newest first
    pub fn get_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tx ORDER BY created_at DESC, id DESC",
            Self::TX_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_tx_row)?;

        let mut transactions = Vec::new();
        for raw in rows {
            transactions.push(raw?.into_transaction()?);
        }
        Ok(transactions)
    }

    pub fn get_transaction_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tx WHERE id = ?",
            Self::TX_COLUMNS
        ))?;
        let mut rows = stmt.query_map([id], row_to_tx_row)?;
        match rows.next() {
            Some(raw) => Ok(Some(raw?.into_transaction()?)),
            None => Ok(None),
        }
    }

    /// Per-status counts for the listing view
    pub fn count_by_status(&self) -> Result<StatusCounts> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tx GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for raw in rows {
            let (status, count) = raw?;
            match TxStatus::parse(&status)? {
                TxStatus::Created => counts.created = count,
                TxStatus::QueuedOffline => counts.queued_offline = count,
                TxStatus::Submitted => counts.submitted = count,
                TxStatus::Completed => counts.completed = count,
                TxStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }

    // === KYC document reads ===

    pub fn get_kyc_docs(&self, user_id: &str) -> Result<Vec<KycDocument>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, uri, mime, uploaded_at, remote_id
             FROM kyc_docs WHERE user_id = ? ORDER BY uploaded_at DESC",
        )?;
        let rows = stmt.query_map([user_id], row_to_doc)?;
        let mut docs = Vec::new();
        for raw in rows {
            docs.push(raw?);
        }
        Ok(docs)
    }

    pub fn get_kyc_doc_by_id(&self, id: &str) -> Result<Option<KycDocument>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, uri, mime, uploaded_at, remote_id FROM kyc_docs WHERE id = ?",
        )?;
        let mut rows = stmt.query_map([id], row_to_doc)?;
        match rows.next() {
            Some(raw) => Ok(Some(raw?)),
            None => Ok(None),
        }
    }

    /// Count of this user's documents still awaiting remote confirmation
    pub fn unconfirmed_doc_count(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kyc_docs WHERE user_id = ? AND remote_id IS NULL",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // === Users ===

    pub fn upsert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, name, kyc_status, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                kyc_status = EXCLUDED.kyc_status",
            params![
                user.id,
                user.name,
                user.kyc_status.as_str(),
                to_epoch_ms(user.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, kyc_status, created_at FROM users WHERE id = ?")?;
        let mut rows = stmt.query_map([id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        match rows.next() {
            Some(raw) => {
                let (id, name, kyc_status, created_at) = raw?;
                Ok(Some(User {
                    id,
                    name,
                    kyc_status: KycStatus::parse(&kyc_status),
                    created_at: from_epoch_ms(created_at),
                }))
            }
            None => Ok(None),
        }
    }

    pub fn set_user_kyc_status(&self, user_id: &str, status: KycStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET kyc_status = ? WHERE id = ?",
            params![status.as_str(), user_id],
        )?;
        Ok(())
    }

    // === Outbox queue ===

    /// Pending entries in deterministic (created_at, id) order
    pub fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, entity, entity_id, op, payload_json, created_at, retry_count
             FROM outbox ORDER BY created_at ASC, id ASC LIMIT ?",
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut entries = Vec::new();
        for raw in rows {
            let (id, entity, entity_id, op, payload_json, created_at, retry_count) = raw?;
            entries.push(OutboxEntry {
                id,
                entity: Entity::parse(&entity)?,
                entity_id,
                op: Op::parse(&op)?,
                payload_json,
                created_at: from_epoch_ms(created_at),
                retry_count,
            });
        }
        Ok(entries)
    }

    /// Number of entries currently awaiting confirmation
    pub fn outbox_len(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(count)
    }

    // === Dispatcher transitions (each one atomic) ===

    /// Record a dispatch attempt: pending status advances to Submitted
    pub fn mark_transaction_submitted(&self, tx_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE tx SET status = 'Submitted', last_attempt_at = ?
             WHERE id = ? AND status IN ('Created', 'QueuedOffline', 'Submitted')",
            params![to_epoch_ms(chrono::Utc::now()), tx_id],
        )?;
        Ok(())
    }

    /// Resolve a confirmed transaction: Completed + remote_id recorded once +
    /// outbox entry removed, all in one transaction.
    ///
    /// Errors (rolling everything back) if the transaction row is missing,
    /// already resolved, or the outbox entry is gone - a later drain then
    /// re-evaluates cleanly.
    pub fn resolve_transaction(&self, entry_id: &str, tx_id: &str, remote_id: &str) -> Result<()> {
        self.with_transaction(|conn| {
            let updated = conn.execute(
                "UPDATE tx SET status = 'Completed', remote_id = ?, error_text = NULL
                 WHERE id = ? AND remote_id IS NULL AND status IN ('Created', 'QueuedOffline', 'Submitted')",
                params![remote_id, tx_id],
            )?;
            if updated != 1 {
                return Err(Error::storage(format!(
                    "Transaction {} not in a resolvable state",
                    tx_id
                )));
            }
            Self::delete_outbox_row(conn, entry_id)
        })
    }

    /// Mark a transaction permanently failed and drop its outbox entry
    pub fn fail_transaction(&self, entry_id: &str, tx_id: &str, error_text: &str) -> Result<()> {
        self.with_transaction(|conn| {
            let updated = conn.execute(
                "UPDATE tx SET status = 'Failed', error_text = ?
                 WHERE id = ? AND status IN ('Created', 'QueuedOffline', 'Submitted')",
                params![error_text, tx_id],
            )?;
            if updated != 1 {
                return Err(Error::storage(format!(
                    "Transaction {} not in a failable state",
                    tx_id
                )));
            }
            Self::delete_outbox_row(conn, entry_id)
        })
    }

    /// Resolve a confirmed document upload
    pub fn resolve_kyc_doc(&self, entry_id: &str, doc_id: &str, remote_id: &str) -> Result<()> {
        self.with_transaction(|conn| {
            let updated = conn.execute(
                "UPDATE kyc_docs SET remote_id = ? WHERE id = ? AND remote_id IS NULL",
                params![remote_id, doc_id],
            )?;
            if updated != 1 {
                return Err(Error::storage(format!(
                    "Document {} not in a resolvable state",
                    doc_id
                )));
            }
            Self::delete_outbox_row(conn, entry_id)
        })
    }

    /// Drop the outbox entry of a permanently rejected document upload
    pub fn fail_kyc_doc(&self, entry_id: &str) -> Result<()> {
        self.with_transaction(|conn| Self::delete_outbox_row(conn, entry_id))
    }

    /// Count a transient failure against an entry; returns the new retry count
    pub fn bump_outbox_retry(&self, entry_id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE outbox SET retry_count = retry_count + 1 WHERE id = ?",
            params![entry_id],
        )?;
        let count: i64 = conn.query_row(
            "SELECT retry_count FROM outbox WHERE id = ?",
            params![entry_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn delete_outbox_row(conn: &Connection, entry_id: &str) -> Result<()> {
        let deleted = conn.execute("DELETE FROM outbox WHERE id = ?", params![entry_id])?;
        if deleted != 1 {
            return Err(Error::storage(format!("Outbox entry {} already removed", entry_id)));
        }
        Ok(())
    }
}

// === Row decoding ===
// All column-shape knowledge lives below; callers only ever see domain types.

struct TxRow {
    id: String,
    user_id: String,
    amount: f64,
    currency: String,
    rate: f64,
    fee: f64,
    to_address: String,
    status: String,
    created_at: i64,
    last_attempt_at: Option<i64>,
    remote_id: Option<String>,
    signed_payload: Option<String>,
    error_text: Option<String>,
}

impl TxRow {
    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            id: self.id,
            user_id: self.user_id,
            amount: f64_to_decimal(self.amount),
            currency: self.currency,
            rate: f64_to_decimal(self.rate),
            fee: f64_to_decimal(self.fee),
            to_address: self.to_address,
            status: TxStatus::parse(&self.status)?,
            created_at: from_epoch_ms(self.created_at),
            last_attempt_at: self.last_attempt_at.map(from_epoch_ms),
            remote_id: self.remote_id,
            signed_payload: self.signed_payload,
            error_text: self.error_text,
        })
    }
}

fn row_to_tx_row(row: &duckdb::Row) -> duckdb::Result<TxRow> {
    Ok(TxRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        rate: row.get(4)?,
        fee: row.get(5)?,
        to_address: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        last_attempt_at: row.get(9)?,
        remote_id: row.get(10)?,
        signed_payload: row.get(11)?,
        error_text: row.get(12)?,
    })
}

fn row_to_doc(row: &duckdb::Row) -> duckdb::Result<KycDocument> {
    let uploaded_at: i64 = row.get(4)?;
    Ok(KycDocument {
        id: row.get(0)?,
        user_id: row.get(1)?,
        uri: row.get(2)?,
        mime: row.get(3)?,
        uploaded_at: from_epoch_ms(uploaded_at),
        remote_id: row.get(5)?,
    })
}

fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_string().parse::<f64>().unwrap_or(0.0)
}

fn f64_to_decimal(f: f64) -> Decimal {
    Decimal::try_from(f).unwrap_or_default()
}
