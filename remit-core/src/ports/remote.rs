//! Remote provider port
//!
//! Defines the interface to the external trading/KYC collaborator. The
//! dispatcher routes each outbox entry to one of these handlers by its
//! (entity, op) pair and never learns the wire format behind them.
//!
//! Every call is a single blocking operation bounded by the adapter's HTTP
//! timeout, and carries an idempotency key equal to the local entity id so
//! that redelivery after a crash mid-drain cannot duplicate remote effects.
//! Failures come back pre-classified through the core error type:
//! `TransientNetwork` for timeouts/connectivity, `TerminalRemote` for
//! rejections.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::domain::{DocPayload, SendPayload};

/// Acknowledgement returned by the remote collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAck {
    /// Canonical identifier assigned by the provider
    pub remote_id: String,
    /// Provider-side state label, if any (e.g. "settling")
    #[serde(default)]
    pub state: Option<String>,
}

/// A corridor rate quote
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    /// Units of destination currency per unit sent
    pub rate: Decimal,
    /// Fee fraction applied to the sent amount
    pub fee_pct: Decimal,
}

/// Remote trading/KYC provider
///
/// One handler per (entity, op) pair:
/// - `tx/CREATE` → [`RemoteProvider::submit_transaction`]
/// - `kyc_docs/KYC_UPLOAD` → [`RemoteProvider::upload_document`]
pub trait RemoteProvider: Send + Sync {
    /// Provider name (e.g. "cybrid", "demo")
    fn name(&self) -> &str;

    /// Fetch the current rate for a corridor pair (e.g. "USD-SLL")
    fn fetch_rate(&self, pair: &str) -> Result<RateQuote>;

    /// Submit a signed transaction.
    ///
    /// # Arguments
    /// * `payload` - The signed send payload
    /// * `idempotency_key` - The local transaction id; resubmitting with the
    ///   same key must not create a second remote transaction
    fn submit_transaction(&self, payload: &SendPayload, idempotency_key: &str) -> Result<RemoteAck>;

    /// Upload an identity-verification document.
    ///
    /// # Arguments
    /// * `payload` - The document metadata payload
    /// * `idempotency_key` - The local document id
    fn upload_document(&self, payload: &DocPayload, idempotency_key: &str) -> Result<RemoteAck>;
}
