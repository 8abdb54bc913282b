//! Demo remote provider
//!
//! A deterministic in-process provider for demo mode: fixed corridor rate,
//! instant acknowledgements with `rmt_`-prefixed identifiers. Useful for
//! trying the app end to end without provider credentials.

use rust_decimal::Decimal;

use crate::domain::result::Result;
use crate::domain::{DocPayload, SendPayload};
use crate::ports::{RateQuote, RemoteAck, RemoteProvider};

/// Deterministic demo provider
pub struct DemoProvider;

impl DemoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DemoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteProvider for DemoProvider {
    fn name(&self) -> &str {
        "demo"
    }

    fn fetch_rate(&self, _pair: &str) -> Result<RateQuote> {
        Ok(RateQuote {
            rate: Decimal::new(23000, 0),
            fee_pct: Decimal::new(1, 2), // 1%
        })
    }

    fn submit_transaction(
        &self,
        _payload: &SendPayload,
        idempotency_key: &str,
    ) -> Result<RemoteAck> {
        Ok(RemoteAck {
            remote_id: format!("rmt_{}", idempotency_key),
            state: Some("completed".to_string()),
        })
    }

    fn upload_document(&self, _payload: &DocPayload, idempotency_key: &str) -> Result<RemoteAck> {
        Ok(RemoteAck {
            remote_id: format!("rmt_{}", idempotency_key),
            state: None,
        })
    }
}
