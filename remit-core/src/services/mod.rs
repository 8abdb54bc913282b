//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod kyc;
pub mod logging;
pub mod migration;
mod send;
mod signing;
mod status;
mod sync;

pub use kyc::KycService;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use send::{SendRequest, SendService};
pub use signing::{SignedPayload, SigningService, SIGNING_ALGORITHM};
pub use status::{StatusService, StatusSummary};
pub use sync::{run_scheduled_sync, DrainReport, SyncConfig, SyncService};
