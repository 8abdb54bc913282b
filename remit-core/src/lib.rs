//! Remit Core - offline-first sync engine for the Remit remittance app
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Transaction, KycDocument, OutboxEntry)
//! - **ports**: Trait definitions for external dependencies (RemoteProvider,
//!   ConnectivityMonitor, SecureStore, PresenceVerifier)
//! - **services**: Business logic orchestration (send, KYC, sync dispatcher,
//!   signing, migrations, logging)
//! - **adapters**: Concrete implementations (DuckDB, Cybrid, demo provider,
//!   file keystore)
//!
//! The engine's contract: a queued mutation is never lost and never applied
//! twice remotely, across process restarts, connectivity flaps, and
//! concurrent trigger sources.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::cybrid::CybridProvider;
use adapters::demo::DemoProvider;
use adapters::duckdb::DuckDbRepository;
use adapters::keystore::FileKeystore;
use config::Config;
use ports::{ConnectivityMonitor, PresenceVerifier, RemoteProvider, SharedConnectivity};
use services::{KycService, SendService, SigningService, StatusService, SyncService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result as CoreResult};
pub use domain::{
    Entity, KycDocument, KycStatus, Op, OutboxEntry, SendPayload, Transaction, TxStatus, User,
};
pub use services::{DrainReport, EntryPoint, LogEvent, LoggingService};

/// Main context for Remit operations
///
/// This is the primary entry point for all business logic. It owns the single
/// database handle for the process and wires it into every service; hosts
/// hold one context and share it.
pub struct RemitContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    /// Connectivity hint source; the host flips this from its network watcher
    pub connectivity: Arc<SharedConnectivity>,
    pub remote: Arc<dyn RemoteProvider>,
    pub send_service: SendService,
    pub kyc_service: KycService,
    pub status_service: StatusService,
    pub sync_service: Arc<SyncService>,
}

impl RemitContext {
    /// Create a new Remit context
    ///
    /// `presence` is the host's user-presence challenge (biometric prompt,
    /// passcode dialog). Headless hosts that never sign can pass a static
    /// allow-all verifier.
    pub fn new(remit_dir: &Path, presence: Arc<dyn PresenceVerifier>) -> Result<Self> {
        let config = Config::load(remit_dir)?;

        let db_filename = if config.demo_mode {
            "demo.duckdb"
        } else {
            "remit.duckdb"
        };
        let db_path = remit_dir.join(db_filename);
        let repository = Arc::new(DuckDbRepository::new(&db_path)?);

        // Initialize schema
        repository.ensure_schema()?;

        let remote: Arc<dyn RemoteProvider> = if config.demo_mode {
            Arc::new(DemoProvider::new())
        } else {
            Arc::new(CybridProvider::new(config.cybrid_config())?)
        };

        let connectivity = Arc::new(SharedConnectivity::new(true));
        let monitor: Arc<dyn ConnectivityMonitor> = connectivity.clone();

        let signing = SigningService::new(Arc::new(FileKeystore::new(remit_dir)), presence);

        let send_service = SendService::new(
            Arc::clone(&repository),
            Arc::clone(&remote),
            Arc::clone(&monitor),
            signing,
            config.corridor.clone(),
        );
        let kyc_service = KycService::new(Arc::clone(&repository));
        let status_service = StatusService::new(Arc::clone(&repository));
        let sync_service = Arc::new(SyncService::new(
            Arc::clone(&repository),
            Arc::clone(&remote),
            Arc::clone(&monitor),
            config.sync_config(),
        ));

        // Edge trigger: reconnects start a drain without waiting for the
        // periodic schedule.
        SyncService::attach_connectivity_trigger(&sync_service);

        Ok(Self {
            config,
            repository,
            connectivity,
            remote,
            send_service,
            kyc_service,
            status_service,
            sync_service,
        })
    }
}
