//! Connection health accounting

use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::debug;

use tracker_core::Symbol;

/// Connected channel count against the expected total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionHealth {
    pub connected: usize,
    pub total: usize,
}

impl ConnectionHealth {
    pub fn is_healthy(&self) -> bool {
        self.connected >= self.total
    }
}

/// Tracks which channels are connected.
///
/// Reports are keyed by symbol, so a repeated `true` or `false` from the same
/// channel never skews the count.
#[derive(Debug)]
pub struct HealthMonitor {
    connected: Mutex<HashSet<Symbol>>,
    health_tx: watch::Sender<ConnectionHealth>,
}

impl HealthMonitor {
    pub fn new(total: usize) -> Self {
        let (health_tx, _) = watch::channel(ConnectionHealth { connected: 0, total });
        Self {
            connected: Mutex::new(HashSet::new()),
            health_tx,
        }
    }

    pub fn report(&self, symbol: &Symbol, connected: bool) {
        let mut set = self.connected.lock();
        let changed = if connected {
            set.insert(symbol.clone())
        } else {
            set.remove(symbol)
        };
        if changed {
            let count = set.len();
            debug!(%symbol, connected, count, "Connectivity changed");
            self.health_tx.send_modify(|h| h.connected = count);
        }
    }

    pub fn set_total(&self, total: usize) {
        self.health_tx.send_if_modified(|h| {
            let modified = h.total != total;
            h.total = total;
            modified
        });
    }

    pub fn is_connected(&self, symbol: &Symbol) -> bool {
        self.connected.lock().contains(symbol)
    }

    pub fn current(&self) -> ConnectionHealth {
        *self.health_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionHealth> {
        self.health_tx.subscribe()
    }
}
