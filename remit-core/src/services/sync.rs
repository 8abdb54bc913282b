//! Sync service - drains the outbox against the remote collaborator
//!
//! The dispatcher is the only component allowed to mutate entity
//! status/remote_id/error_text or delete outbox rows. Each drain cycle
//! resolves a bounded batch in deterministic (created_at, id) order, one
//! atomic local transaction per entry, with per-entry error isolation so a
//! single poisoned entry never blocks the rest of the queue.
//!
//! Triggering is dual: edge (connectivity reconnect subscription) and level
//! (periodic scheduler or explicit invocation). All triggers funnel through
//! [`SyncService::trigger`], which is single-flight: triggers landing during
//! an active cycle coalesce into exactly one follow-up cycle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{DocPayload, Entity, KycStatus, Op, OutboxEntry, SendPayload};
use crate::ports::{ConnectivityMonitor, RemoteProvider};

/// Configuration for drain behavior
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum entries resolved per drain cycle
    pub batch_limit: usize,
    /// Transient-failure budget per entry; the next transient failure past
    /// this count is promoted to a terminal failure
    pub max_retries: i64,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self {
            batch_limit: 10,
            max_retries: 10,
        }
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i64) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one entry within a drain cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    /// Remote confirmed; entity advanced and outbox row deleted
    Resolved,
    /// Transient failure; entry left queued with retry_count incremented
    Retried,
    /// Terminal failure; entity marked Failed and outbox row deleted
    Failed,
}

/// Summary of one or more coalesced drain cycles
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DrainReport {
    /// Entries handed to a remote handler
    pub dispatched: usize,
    /// Entries confirmed and removed from the queue
    pub resolved: usize,
    /// Entries left queued after a transient failure
    pub retried: usize,
    /// Entries resolved as permanently failed
    pub failed: usize,
    /// Entries skipped because a local storage step errored; they stay
    /// queued untouched for the next cycle
    pub skipped: usize,
}

impl DrainReport {
    fn merge(&mut self, other: &DrainReport) {
        self.dispatched += other.dispatched;
        self.resolved += other.resolved;
        self.retried += other.retried;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// True when nothing was left behind in a bad way
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// The sync dispatcher
pub struct SyncService {
    repository: Arc<DuckDbRepository>,
    remote: Arc<dyn RemoteProvider>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    config: SyncConfig,
    /// Single-flight guard: true while a drain is executing
    active: AtomicBool,
    /// Set by triggers that arrive during an active drain; consumed for
    /// exactly one follow-up cycle
    pending_trigger: AtomicBool,
    /// Checked between entries only, never inside an entry's atomic step
    cancelled: AtomicBool,
    cycles_completed: AtomicU64,
}

impl SyncService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        remote: Arc<dyn RemoteProvider>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        config: SyncConfig,
    ) -> Self {
        Self {
            repository,
            remote,
            connectivity,
            config,
            active: AtomicBool::new(false),
            pending_trigger: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            cycles_completed: AtomicU64::new(0),
        }
    }

    /// Number of drain cycles completed since construction
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    /// Request cancellation of an ongoing drain; honored between entries
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation request
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Best-effort connectivity snapshot (hint only; remote calls carry
    /// their own timeout)
    pub fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }

    /// Register the edge trigger: an offline→online transition starts a
    /// drain. Holds only a weak reference so the subscription never keeps
    /// the service alive.
    pub fn attach_connectivity_trigger(this: &Arc<Self>) {
        let weak = Arc::downgrade(this);
        this.connectivity.on_change(Box::new(move |online| {
            if online {
                if let Some(service) = weak.upgrade() {
                    let _ = service.trigger();
                }
            }
        }));
    }

    /// Run a drain, or coalesce into the one already running.
    ///
    /// Returns `Ok(None)` when another thread owns the active cycle - that
    /// cycle runs exactly one follow-up on behalf of every trigger that
    /// landed while it was draining.
    pub fn trigger(&self) -> Result<Option<DrainReport>> {
        // Raise the flag before trying to acquire the cycle: whoever holds
        // the cycle always re-checks the flag after releasing, so a trigger
        // is never lost, and any number of concurrent triggers collapse
        // into one follow-up.
        self.pending_trigger.store(true, Ordering::SeqCst);

        let mut total = DrainReport::default();
        let mut ran = false;
        while self.pending_trigger.load(Ordering::SeqCst) {
            if self
                .active
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Ok(None);
            }

            let outcome = if self.pending_trigger.swap(false, Ordering::SeqCst) {
                let result = self.drain_cycle();
                if result.is_ok() {
                    self.cycles_completed.fetch_add(1, Ordering::SeqCst);
                }
                Some(result)
            } else {
                None
            };
            self.active.store(false, Ordering::SeqCst);

            match outcome {
                Some(Ok(report)) => {
                    ran = true;
                    total.merge(&report);
                }
                Some(Err(e)) => return Err(e),
                None => {}
            }
        }

        Ok(if ran { Some(total) } else { None })
    }

    /// One bounded batch in deterministic order
    fn drain_cycle(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        let entries = self.repository.pending_outbox(self.config.batch_limit)?;

        for entry in entries {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            report.dispatched += 1;
            match self.dispatch_entry(&entry) {
                Ok(EntryOutcome::Resolved) => report.resolved += 1,
                Ok(EntryOutcome::Retried) => report.retried += 1,
                Ok(EntryOutcome::Failed) => report.failed += 1,
                // A failing local step must not block the remainder of the
                // batch; the entry stays queued for a later cycle.
                Err(_) => report.skipped += 1,
            }
        }

        Ok(report)
    }

    /// Route one entry to the remote handler registered for its (entity, op)
    fn dispatch_entry(&self, entry: &OutboxEntry) -> Result<EntryOutcome> {
        match (entry.entity, entry.op) {
            (Entity::Tx, Op::Create) => self.dispatch_tx_create(entry),
            (Entity::KycDoc, Op::KycUpload) => self.dispatch_doc_upload(entry),
            // A mismatched pairing can only come from a corrupt row; it will
            // never dispatch, so resolve it as failed.
            (Entity::Tx, Op::KycUpload) => {
                self.repository.fail_transaction(
                    &entry.id,
                    &entry.entity_id,
                    "No remote handler for tx/KYC_UPLOAD",
                )?;
                Ok(EntryOutcome::Failed)
            }
            (Entity::KycDoc, Op::Create) => {
                self.repository.fail_kyc_doc(&entry.id)?;
                Ok(EntryOutcome::Failed)
            }
        }
    }

    fn dispatch_tx_create(&self, entry: &OutboxEntry) -> Result<EntryOutcome> {
        let payload = match SendPayload::from_json(&entry.payload_json) {
            Ok(payload) => payload,
            // An undecodable payload can never be submitted
            Err(e) => {
                self.repository.fail_transaction(
                    &entry.id,
                    &entry.entity_id,
                    &format!("Undecodable payload: {}", e),
                )?;
                return Ok(EntryOutcome::Failed);
            }
        };

        // Observable in-flight marker; set once, monotonic
        self.repository.mark_transaction_submitted(&entry.entity_id)?;

        match self.remote.submit_transaction(&payload, &entry.entity_id) {
            Ok(ack) => {
                self.repository
                    .resolve_transaction(&entry.id, &entry.entity_id, &ack.remote_id)?;
                Ok(EntryOutcome::Resolved)
            }
            Err(e) if e.is_transient() => self.handle_transient_tx(entry, &e),
            Err(e) if e.is_terminal_remote() => {
                self.repository
                    .fail_transaction(&entry.id, &entry.entity_id, &e.to_string())?;
                Ok(EntryOutcome::Failed)
            }
            Err(e) => Err(e),
        }
    }

    fn handle_transient_tx(&self, entry: &OutboxEntry, cause: &Error) -> Result<EntryOutcome> {
        let retries = self.repository.bump_outbox_retry(&entry.id)?;
        if retries >= self.config.max_retries {
            self.repository.fail_transaction(
                &entry.id,
                &entry.entity_id,
                &format!("Retry budget exhausted after {} attempts: {}", retries, cause),
            )?;
            Ok(EntryOutcome::Failed)
        } else {
            Ok(EntryOutcome::Retried)
        }
    }

    fn dispatch_doc_upload(&self, entry: &OutboxEntry) -> Result<EntryOutcome> {
        let payload = match DocPayload::from_json(&entry.payload_json) {
            Ok(payload) => payload,
            Err(_) => {
                self.repository.fail_kyc_doc(&entry.id)?;
                return Ok(EntryOutcome::Failed);
            }
        };

        match self.remote.upload_document(&payload, &entry.entity_id) {
            Ok(ack) => {
                self.repository
                    .resolve_kyc_doc(&entry.id, &entry.entity_id, &ack.remote_id)?;
                // All documents confirmed: the user's verification is fully
                // submitted to the provider.
                if self.repository.unconfirmed_doc_count(&payload.user_id)? == 0 {
                    self.repository
                        .set_user_kyc_status(&payload.user_id, KycStatus::Submitted)?;
                }
                Ok(EntryOutcome::Resolved)
            }
            Err(e) if e.is_transient() => {
                let retries = self.repository.bump_outbox_retry(&entry.id)?;
                if retries >= self.config.max_retries {
                    self.repository.fail_kyc_doc(&entry.id)?;
                    Ok(EntryOutcome::Failed)
                } else {
                    Ok(EntryOutcome::Retried)
                }
            }
            Err(e) if e.is_terminal_remote() => {
                self.repository.fail_kyc_doc(&entry.id)?;
                Ok(EntryOutcome::Failed)
            }
            Err(e) => Err(e),
        }
    }
}

/// Stateless scheduler entry point.
///
/// The host's background scheduler (or cron, or a boot hook) invokes this by
/// name with nothing but the data directory. All state flows through the
/// durable store, so repeated, missed, or out-of-order invocations are safe.
/// Returns `Ok(None)` when offline (per the connectivity hint) or when a
/// drain was already in flight.
pub fn run_scheduled_sync(remit_dir: &Path) -> anyhow::Result<Option<DrainReport>> {
    use crate::adapters::keystore::StaticPresence;
    use crate::services::logging::{EntryPoint, LogEvent, LoggingService};

    let ctx = crate::RemitContext::new(remit_dir, Arc::new(StaticPresence::allowing()))?;
    if !ctx.sync_service.is_connected() {
        return Ok(None);
    }

    let report = ctx.sync_service.trigger()?;

    // Best-effort event trail; logging must never fail the sync itself
    if let Some(report) = report.as_ref() {
        if let Ok(logger) =
            LoggingService::new(remit_dir, EntryPoint::Scheduler, env!("CARGO_PKG_VERSION"))
        {
            let mut event = LogEvent::new("sync_cycle_completed").with_provider(ctx.remote.name());
            if report.failed > 0 {
                event = event.with_error(format!(
                    "{} mutation(s) permanently failed",
                    report.failed
                ));
            }
            let _ = logger.log(event);
        }
    }

    Ok(report)
}
