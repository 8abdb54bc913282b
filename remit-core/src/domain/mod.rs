//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod kyc;
mod outbox;
mod payload;
mod transaction;
mod user;
pub mod result;

pub use kyc::KycDocument;
pub use outbox::{Entity, Op, OutboxEntry};
pub use payload::{DocPayload, SendPayload};
pub use transaction::{
    from_epoch_ms, mint_local_id, to_epoch_ms, Transaction, TxStatus, LOCAL_ID_PREFIX,
};
pub use user::{KycStatus, User};
