//! Send service - the producer side of the engine
//!
//! Quoting, signing, and the atomic dual-write of a new transaction plus its
//! outbox entry. Queuing confirmation is immediate and independent of
//! connectivity: the caller gets the queued transaction back as soon as the
//! dual-write commits, and reconciliation happens silently afterwards.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Entity, Op, OutboxEntry, SendPayload, Transaction, TxStatus};
use crate::ports::{ConnectivityMonitor, RemoteProvider};
use crate::services::SigningService;

/// A requested remittance
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub user_id: String,
    pub amount: Decimal,
    /// ISO 4217 code of the sent amount
    pub currency: String,
    pub to_address: String,
}

/// Service that queues new remittances
pub struct SendService {
    repository: Arc<DuckDbRepository>,
    remote: Arc<dyn RemoteProvider>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    signing: SigningService,
    /// Corridor symbol quoted for the rate (e.g. "USD-SLL")
    corridor: String,
}

impl SendService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        remote: Arc<dyn RemoteProvider>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        signing: SigningService,
        corridor: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            remote,
            connectivity,
            signing,
            corridor: corridor.into(),
        }
    }

    /// Queue a new remittance.
    ///
    /// Order of operations matters: the presence challenge runs as part of
    /// signing, before anything is persisted, so a denied challenge leaves
    /// no tx row and no outbox row behind.
    pub fn send(&self, request: SendRequest) -> Result<Transaction> {
        if request.amount <= Decimal::ZERO {
            return Err(Error::validation("Amount must be positive"));
        }
        if request.to_address.trim().is_empty() {
            return Err(Error::validation("Recipient address is required"));
        }

        // 1) Quote the corridor (cached quote serves as offline fallback)
        let quote = self.remote.fetch_rate(&self.corridor)?;
        let fee = (request.amount * quote.fee_pct).round_dp(2);

        // 2) Pick the initial status from the connectivity hint
        let status = if self.connectivity.is_connected() {
            TxStatus::Created
        } else {
            TxStatus::QueuedOffline
        };

        let mut tx = Transaction::new(
            request.user_id.clone(),
            request.amount,
            request.currency.clone(),
            quote.rate,
            fee,
            request.to_address.clone(),
            status,
        );

        // 3) Sign the canonical payload (presence challenge happens here)
        let mut payload = SendPayload {
            id: tx.id.clone(),
            user_id: request.user_id,
            amount: request.amount,
            currency: request.currency,
            to_address: request.to_address,
            rate: quote.rate,
            fee,
            created_at: tx.created_at,
            signature: None,
        };
        let signed = self.signing.sign(&payload)?;
        payload.signature = Some(signed.signature.clone());
        tx.signed_payload = Some(signed.signature);

        // 4) Dual-write: entity row + outbox entry in one atomic unit
        let entry = OutboxEntry::new(Entity::Tx, tx.id.clone(), Op::Create, payload.to_json()?);
        self.repository.create_transaction_with_outbox(&tx, &entry)?;

        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::DemoProvider;
    use crate::adapters::keystore::{FileKeystore, StaticPresence};
    use crate::ports::SharedConnectivity;
    use tempfile::TempDir;

    fn service(dir: &TempDir, online: bool, allow_presence: bool) -> SendService {
        let repository = Arc::new(
            DuckDbRepository::new(&dir.path().join("test.duckdb")).unwrap(),
        );
        repository.ensure_schema().unwrap();
        let presence: Arc<dyn crate::ports::PresenceVerifier> = if allow_presence {
            Arc::new(StaticPresence::allowing())
        } else {
            Arc::new(StaticPresence::denying())
        };
        let signing =
            SigningService::new(Arc::new(FileKeystore::new(dir.path())), presence);
        SendService::new(
            repository,
            Arc::new(DemoProvider::new()),
            Arc::new(SharedConnectivity::new(online)),
            signing,
            "USD-SLL",
        )
    }

    fn request() -> SendRequest {
        SendRequest {
            user_id: "demo-user".to_string(),
            amount: Decimal::new(10000, 2),
            currency: "USD".to_string(),
            to_address: "recipient-123".to_string(),
        }
    }

    #[test]
    fn test_send_computes_fee_from_quote() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, true, true);

        let tx = service.send(request()).unwrap();
        // Demo provider quotes 1% on 100.00
        assert_eq!(tx.fee, Decimal::new(100, 2));
        assert_eq!(tx.rate, Decimal::new(23000, 0));
        assert_eq!(tx.status, TxStatus::Created);
        assert!(tx.signed_payload.is_some());
    }

    #[test]
    fn test_send_offline_queues_offline() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, false, true);

        let tx = service.send(request()).unwrap();
        assert_eq!(tx.status, TxStatus::QueuedOffline);
    }

    #[test]
    fn test_send_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, true, true);

        let mut bad = request();
        bad.amount = Decimal::ZERO;
        assert!(service.send(bad).is_err());

        let mut bad = request();
        bad.to_address = "  ".to_string();
        assert!(service.send(bad).is_err());
    }
}
