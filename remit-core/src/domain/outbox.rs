//! Outbox domain model - the durable log of not-yet-confirmed mutations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::{Error, Result};

/// Entity table an outbox entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    Tx,
    KycDoc,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Tx => "tx",
            Entity::KycDoc => "kyc_docs",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "tx" => Ok(Entity::Tx),
            "kyc_docs" => Ok(Entity::KycDoc),
            other => Err(Error::validation(format!("Unknown outbox entity: {}", other))),
        }
    }
}

/// Operation an outbox entry requests against the remote collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Create,
    KycUpload,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Create => "CREATE",
            Op::KycUpload => "KYC_UPLOAD",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "CREATE" => Ok(Op::Create),
            "KYC_UPLOAD" => Ok(Op::KycUpload),
            other => Err(Error::validation(format!("Unknown outbox op: {}", other))),
        }
    }
}

/// One pending mutation.
///
/// An entry exists if and only if its referenced mutation has not yet been
/// confirmed remotely. The queue's total order is `(created_at, id)`, which
/// stays deterministic even when two entries share a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub entity: Entity,
    /// Id of the referenced entity row; doubles as the idempotency key
    pub entity_id: String,
    pub op: Op,
    /// Opaque payload blob, decoded only by the dispatcher
    pub payload_json: String,
    pub created_at: DateTime<Utc>,
    pub retry_count: i64,
}

impl OutboxEntry {
    /// Create a new pending entry for an entity mutation
    pub fn new(entity: Entity, entity_id: impl Into<String>, op: Op, payload_json: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity,
            entity_id: entity_id.into(),
            op,
            payload_json,
            created_at: Utc::now(),
            retry_count: 0,
        }
    }

    /// Ordering key for deterministic, starvation-free draining
    pub fn ordering_key(&self) -> (i64, &str) {
        (self.created_at.timestamp_millis(), &self.id)
    }
}
