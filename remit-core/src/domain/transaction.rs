//! Transaction domain model and lifecycle state machine

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::{Error, Result};

/// Prefix for locally minted transaction identifiers.
///
/// A transaction keeps its `loc_` id for its whole local life; the canonical
/// identifier assigned by the remote provider lands in `remote_id` exactly
/// once, on confirmation. The distinct formats make the two spaces
/// collision-free.
pub const LOCAL_ID_PREFIX: &str = "loc_";

/// Mint a new local-scope transaction id
pub fn mint_local_id() -> String {
    format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4().simple())
}

/// Lifecycle status of a transaction.
///
/// Transitions are monotonic along:
/// `Created → {QueuedOffline | Submitted} → {Completed | Failed}`.
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Written locally while connectivity was reported present.
    Created,
    /// Written locally while offline; awaiting a first dispatch.
    QueuedOffline,
    /// Dispatched to the remote provider at least once, not yet resolved.
    Submitted,
    /// Confirmed by the remote provider.
    Completed,
    /// Permanently rejected; `error_text` carries the reason.
    Failed,
}

impl TxStatus {
    /// Stable string form used in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Created => "Created",
            TxStatus::QueuedOffline => "QueuedOffline",
            TxStatus::Submitted => "Submitted",
            TxStatus::Completed => "Completed",
            TxStatus::Failed => "Failed",
        }
    }

    /// Parse the database string form
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Created" => Ok(TxStatus::Created),
            "QueuedOffline" => Ok(TxStatus::QueuedOffline),
            "Submitted" => Ok(TxStatus::Submitted),
            "Completed" => Ok(TxStatus::Completed),
            "Failed" => Ok(TxStatus::Failed),
            other => Err(Error::validation(format!("Unknown tx status: {}", other))),
        }
    }

    /// True once no further transition may leave this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Completed | TxStatus::Failed)
    }

    /// True while the transaction still has an unconfirmed mutation
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the lifecycle graph permits `self → next`
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            TxStatus::Created => matches!(
                next,
                TxStatus::QueuedOffline
                    | TxStatus::Submitted
                    | TxStatus::Completed
                    | TxStatus::Failed
            ),
            TxStatus::QueuedOffline | TxStatus::Submitted => {
                matches!(next, TxStatus::Submitted | TxStatus::Completed | TxStatus::Failed)
            }
            TxStatus::Completed | TxStatus::Failed => false,
        }
    }
}

/// A single remittance transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Locally minted id (`loc_` prefix) - never replaced
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    /// ISO 4217 currency code of the sent amount
    pub currency: String,
    /// Corridor rate quoted at send time
    pub rate: Decimal,
    pub fee: Decimal,
    pub to_address: String,
    pub status: TxStatus,
    pub created_at: DateTime<Utc>,
    /// Last time the dispatcher attempted this transaction
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Canonical identifier from the remote provider; set exactly once
    pub remote_id: Option<String>,
    /// Hex signature produced at send time over the canonical payload
    pub signed_payload: Option<String>,
    /// Reason text for a `Failed` transaction
    pub error_text: Option<String>,
}

impl Transaction {
    /// Create a new transaction with required fields
    pub fn new(
        user_id: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        rate: Decimal,
        fee: Decimal,
        to_address: impl Into<String>,
        status: TxStatus,
    ) -> Self {
        Self {
            id: mint_local_id(),
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            rate,
            fee,
            to_address: to_address.into(),
            status,
            created_at: Utc::now(),
            last_attempt_at: None,
            remote_id: None,
            signed_payload: None,
            error_text: None,
        }
    }

    /// True if the id was minted locally (not a remote identifier)
    pub fn has_local_id(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }
}

/// Convert a `DateTime<Utc>` to the epoch-millisecond form stored in DuckDB
pub fn to_epoch_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert stored epoch milliseconds back to a `DateTime<Utc>`
pub fn from_epoch_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx(status: TxStatus) -> Transaction {
        Transaction::new(
            "demo-user",
            Decimal::new(10000, 2),
            "USD",
            Decimal::new(23000, 0),
            Decimal::new(100, 2),
            "recipient-123",
            status,
        )
    }

    #[test]
    fn test_local_id_prefix() {
        let tx = sample_tx(TxStatus::Created);
        assert!(tx.has_local_id());
        assert!(tx.id.starts_with("loc_"));
        assert!(tx.remote_id.is_none());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TxStatus::Created,
            TxStatus::QueuedOffline,
            TxStatus::Submitted,
            TxStatus::Completed,
            TxStatus::Failed,
        ] {
            assert_eq!(TxStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TxStatus::parse("Bogus").is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [TxStatus::Completed, TxStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                TxStatus::Created,
                TxStatus::QueuedOffline,
                TxStatus::Submitted,
                TxStatus::Completed,
                TxStatus::Failed,
            ] {
                if next != terminal {
                    assert!(!terminal.can_transition_to(next));
                }
            }
        }
    }

    #[test]
    fn test_lifecycle_graph() {
        assert!(TxStatus::Created.can_transition_to(TxStatus::QueuedOffline));
        assert!(TxStatus::Created.can_transition_to(TxStatus::Submitted));
        assert!(TxStatus::Created.can_transition_to(TxStatus::Completed));
        assert!(TxStatus::QueuedOffline.can_transition_to(TxStatus::Submitted));
        assert!(TxStatus::QueuedOffline.can_transition_to(TxStatus::Completed));
        assert!(TxStatus::Submitted.can_transition_to(TxStatus::Failed));
        // No going back to the queue once submitted
        assert!(!TxStatus::Submitted.can_transition_to(TxStatus::QueuedOffline));
    }

    #[test]
    fn test_epoch_ms_roundtrip() {
        let now = Utc::now();
        let back = from_epoch_ms(to_epoch_ms(now));
        // Storage granularity is milliseconds
        assert_eq!(back.timestamp_millis(), now.timestamp_millis());
    }
}
