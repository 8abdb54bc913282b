//! Concurrent producer/dispatcher tests
//!
//! These tests verify that producers can keep queueing new mutations while a
//! drain is in progress, and that simultaneous triggers from many threads
//! never dispatch an entry twice.
//!
//! Run with: cargo test --test concurrent_sync_test -- --nocapture

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use rust_decimal::Decimal;
use tempfile::TempDir;

use remit_core::adapters::duckdb::DuckDbRepository;
use remit_core::adapters::keystore::{FileKeystore, StaticPresence};
use remit_core::domain::result::Result as CoreResult;
use remit_core::domain::{DocPayload, SendPayload};
use remit_core::ports::{
    ConnectivityMonitor, RateQuote, RemoteAck, RemoteProvider, SharedConnectivity,
};
use remit_core::services::{
    SendRequest, SendService, SigningService, SyncConfig, SyncService,
};
use remit_core::TxStatus;

/// Always-confirming remote with optional latency and a per-key call counter
struct CountingRemote {
    delay: Option<Duration>,
    calls_per_key: Mutex<HashMap<String, usize>>,
}

impl CountingRemote {
    fn new(delay: Option<Duration>) -> Self {
        Self {
            delay,
            calls_per_key: Mutex::new(HashMap::new()),
        }
    }

    fn record(&self, idempotency_key: &str) -> CoreResult<RemoteAck> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        *self
            .calls_per_key
            .lock()
            .unwrap()
            .entry(idempotency_key.to_string())
            .or_insert(0) += 1;
        Ok(RemoteAck {
            remote_id: format!("rmt_{}", idempotency_key),
            state: None,
        })
    }

    fn max_calls_for_any_key(&self) -> usize {
        self.calls_per_key
            .lock()
            .unwrap()
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    fn distinct_keys(&self) -> usize {
        self.calls_per_key.lock().unwrap().len()
    }
}

impl RemoteProvider for CountingRemote {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch_rate(&self, _pair: &str) -> CoreResult<RateQuote> {
        Ok(RateQuote {
            rate: Decimal::new(23000, 0),
            fee_pct: Decimal::new(1, 2),
        })
    }

    fn submit_transaction(
        &self,
        _payload: &SendPayload,
        idempotency_key: &str,
    ) -> CoreResult<RemoteAck> {
        self.record(idempotency_key)
    }

    fn upload_document(
        &self,
        _payload: &DocPayload,
        idempotency_key: &str,
    ) -> CoreResult<RemoteAck> {
        self.record(idempotency_key)
    }
}

fn build_stack(
    dir: &TempDir,
    remote: Arc<CountingRemote>,
) -> (Arc<DuckDbRepository>, Arc<SendService>, Arc<SyncService>) {
    let repository = Arc::new(DuckDbRepository::new(&dir.path().join("test.duckdb")).unwrap());
    repository.ensure_schema().unwrap();
    let connectivity = Arc::new(SharedConnectivity::new(true));

    let signing = SigningService::new(
        Arc::new(FileKeystore::new(dir.path())),
        Arc::new(StaticPresence::allowing()),
    );
    let send = Arc::new(SendService::new(
        Arc::clone(&repository),
        remote.clone() as Arc<dyn RemoteProvider>,
        connectivity.clone() as Arc<dyn ConnectivityMonitor>,
        signing,
        "USD-SLL",
    ));
    let sync = Arc::new(SyncService::new(
        Arc::clone(&repository),
        remote as Arc<dyn RemoteProvider>,
        connectivity as Arc<dyn ConnectivityMonitor>,
        SyncConfig::default().with_batch_limit(100),
    ));

    (repository, send, sync)
}

fn request(amount: i64) -> SendRequest {
    SendRequest {
        user_id: "demo-user".to_string(),
        amount: Decimal::new(amount, 2),
        currency: "USD".to_string(),
        to_address: "recipient-123".to_string(),
    }
}

/// Producers keep queueing while a slow drain runs; nothing is lost and
/// everything eventually resolves exactly once.
#[test]
fn test_producers_during_active_drain() {
    const PRODUCER_THREADS: usize = 3;
    const SENDS_PER_THREAD: usize = 4;

    let dir = TempDir::new().unwrap();
    let remote = Arc::new(CountingRemote::new(Some(Duration::from_millis(40))));
    let (repository, send, sync) = build_stack(&dir, Arc::clone(&remote));

    // Pre-queue a couple of entries so the drain has work when it starts
    send.send(request(10000)).unwrap();
    send.send(request(20000)).unwrap();

    let drainer = {
        let sync = Arc::clone(&sync);
        thread::spawn(move || {
            let _ = sync.trigger().unwrap();
        })
    };

    let barrier = Arc::new(Barrier::new(PRODUCER_THREADS));
    let send_errors = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for thread_id in 0..PRODUCER_THREADS {
        let barrier = Arc::clone(&barrier);
        let send = Arc::clone(&send);
        let send_errors = Arc::clone(&send_errors);

        let handle = thread::spawn(move || {
            barrier.wait();
            for i in 0..SENDS_PER_THREAD {
                let amount = ((thread_id * SENDS_PER_THREAD + i + 1) * 100) as i64;
                if send.send(request(amount)).is_err() {
                    send_errors.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
    drainer.join().unwrap();

    assert_eq!(send_errors.load(Ordering::SeqCst), 0);

    // Drain whatever the producers queued after the first cycle finished
    sync.trigger().unwrap();

    let expected = 2 + PRODUCER_THREADS * SENDS_PER_THREAD;
    let transactions = repository.get_transactions().unwrap();
    assert_eq!(transactions.len(), expected);
    for tx in &transactions {
        assert_eq!(tx.status, TxStatus::Completed, "tx {} not resolved", tx.id);
    }
    assert_eq!(repository.outbox_len().unwrap(), 0);

    // Exactly one remote dispatch per entry
    assert_eq!(remote.distinct_keys(), expected);
    assert_eq!(remote.max_calls_for_any_key(), 1);
}

/// A burst of simultaneous triggers from many threads dispatches every entry
/// exactly once.
#[test]
fn test_trigger_burst_never_double_dispatches() {
    const TRIGGER_THREADS: usize = 6;
    const QUEUED: usize = 5;

    let dir = TempDir::new().unwrap();
    let remote = Arc::new(CountingRemote::new(Some(Duration::from_millis(10))));
    let (repository, send, sync) = build_stack(&dir, Arc::clone(&remote));

    for i in 0..QUEUED {
        send.send(request(((i + 1) * 100) as i64)).unwrap();
    }

    let barrier = Arc::new(Barrier::new(TRIGGER_THREADS));
    let coalesced = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for _ in 0..TRIGGER_THREADS {
        let barrier = Arc::clone(&barrier);
        let sync = Arc::clone(&sync);
        let coalesced = Arc::clone(&coalesced);

        let handle = thread::spawn(move || {
            barrier.wait();
            if sync.trigger().unwrap().is_none() {
                coalesced.fetch_add(1, Ordering::SeqCst);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // All but the cycle owners coalesced rather than stacking
    assert!(coalesced.load(Ordering::SeqCst) >= TRIGGER_THREADS - 2);

    assert_eq!(repository.outbox_len().unwrap(), 0);
    assert_eq!(remote.distinct_keys(), QUEUED);
    assert_eq!(remote.max_calls_for_any_key(), 1);
}

/// The single-flight guard recovers after a cycle finishes: sequential
/// triggers each get to run.
#[test]
fn test_sequential_triggers_after_idle() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(CountingRemote::new(None));
    let (_repository, send, sync) = build_stack(&dir, Arc::clone(&remote));

    for round in 0..3 {
        send.send(request((round + 1) * 100)).unwrap();
        let report = sync.trigger().unwrap().expect("idle trigger must run");
        assert_eq!(report.resolved, 1);
    }
    assert_eq!(sync.cycles_completed(), 3);
}
