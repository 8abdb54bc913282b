//! Connectivity monitor port
//!
//! The dispatcher treats connectivity as a best-effort hint only: a stale
//! snapshot never blocks a drain, and every remote call is independently
//! bounded by the HTTP client timeout regardless of the reported state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Callback invoked on a connectivity transition; `true` means online
pub type ConnectivityCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Online/offline state source
pub trait ConnectivityMonitor: Send + Sync {
    /// Best-effort snapshot of the current state
    fn is_connected(&self) -> bool;

    /// Register a callback for state transitions
    fn on_change(&self, callback: ConnectivityCallback);
}

/// Process-local connectivity monitor.
///
/// The host (app shell, OS network listener) flips the flag; subscribers are
/// notified on every transition, which gives the dispatcher its edge trigger
/// on reconnect.
pub struct SharedConnectivity {
    online: AtomicBool,
    subscribers: Mutex<Vec<ConnectivityCallback>>,
}

impl SharedConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Update the state, notifying subscribers if it changed
    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            for callback in subscribers.iter() {
                callback(online);
            }
        }
    }
}

impl Default for SharedConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor for SharedConnectivity {
    fn is_connected(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn on_change(&self, callback: ConnectivityCallback) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_tracks_flag() {
        let monitor = SharedConnectivity::new(false);
        assert!(!monitor.is_connected());
        monitor.set_online(true);
        assert!(monitor.is_connected());
    }

    #[test]
    fn test_subscribers_fire_on_transitions_only() {
        let monitor = SharedConnectivity::new(false);
        let edges = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&edges);
        monitor.on_change(Box::new(move |online| {
            if online {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        monitor.set_online(false); // no transition
        monitor.set_online(true); // offline -> online edge
        monitor.set_online(true); // no transition
        monitor.set_online(false);
        monitor.set_online(true); // second edge

        assert_eq!(edges.load(Ordering::SeqCst), 2);
    }
}
