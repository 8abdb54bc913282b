//! Outbox payload blobs
//!
//! These are the opaque JSON payloads carried by outbox entries. The field
//! order of each struct is the canonical form: signing and the remote wire
//! encoding both serialize these with serde_json, so identical payloads
//! always produce identical bytes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::Result;

/// Payload of a `tx/CREATE` outbox entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendPayload {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub to_address: String,
    pub rate: Decimal,
    pub fee: Decimal,
    pub created_at: DateTime<Utc>,
    /// Hex signature over the canonical form of this payload (without the
    /// signature field itself), attached after signing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl SendPayload {
    /// The bytes that get signed: this payload without its signature field
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        Ok(serde_json::to_vec(&unsigned)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Payload of a `kyc_docs/KYC_UPLOAD` outbox entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocPayload {
    pub id: String,
    pub user_id: String,
    pub uri: String,
    pub mime: String,
    pub uploaded_at: DateTime<Utc>,
}

impl DocPayload {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> SendPayload {
        SendPayload {
            id: "loc_abc".to_string(),
            user_id: "demo-user".to_string(),
            amount: Decimal::new(10000, 2),
            currency: "USD".to_string(),
            to_address: "recipient-123".to_string(),
            rate: Decimal::new(23000, 0),
            fee: Decimal::new(100, 2),
            created_at: Utc::now(),
            signature: None,
        }
    }

    #[test]
    fn test_payload_json_roundtrip() {
        let payload = sample_payload();
        let json = payload.to_json().unwrap();
        let back = SendPayload::from_json(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_canonical_bytes_ignore_signature() {
        let mut payload = sample_payload();
        let unsigned = payload.canonical_bytes().unwrap();
        payload.signature = Some("deadbeef".to_string());
        let signed = payload.canonical_bytes().unwrap();
        assert_eq!(unsigned, signed);
    }
}
