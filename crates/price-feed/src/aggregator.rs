//! Price aggregator - single writer of the ranked snapshot

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use tracker_core::{CoreResult, DeltaEvent, Instrument, RankedRow, RankedSnapshot};

use crate::subscription::PriceSubscription;

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    ignored_unknown: AtomicU64,
}

/// Aggregator statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorStats {
    pub applied: u64,
    pub ignored_unknown: u64,
    pub version: u64,
}

/// Owns the canonical ranked snapshot.
///
/// Mutation requires `&mut self`, so whoever owns the aggregator is the only
/// writer. Everyone else reads through a [`SnapshotReader`].
pub struct PriceAggregator {
    snapshot_tx: watch::Sender<Arc<RankedSnapshot>>,
    counters: Arc<Counters>,
}

impl PriceAggregator {
    /// Seed from the catalog with every delta at zero.
    pub fn seed(instruments: Vec<Instrument>) -> CoreResult<Self> {
        let snapshot = RankedSnapshot::seed(instruments)?;
        let (snapshot_tx, _) = watch::channel(Arc::new(snapshot));
        Ok(Self {
            snapshot_tx,
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn snapshot(&self) -> Arc<RankedSnapshot> {
        Arc::clone(&self.snapshot_tx.borrow())
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.snapshot_tx.subscribe(),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Instruments in catalog order
    pub fn instruments(&self) -> Vec<Arc<Instrument>> {
        let snapshot = self.snapshot();
        let mut entries: Vec<_> = snapshot.entries().iter().collect();
        entries.sort_by_key(|e| e.catalog_index);
        entries.into_iter().map(|e| Arc::clone(&e.instrument)).collect()
    }

    /// Apply one delta and publish the result.
    ///
    /// Unknown symbols leave the published snapshot untouched.
    pub fn apply_delta(&mut self, event: &DeltaEvent) -> Arc<RankedSnapshot> {
        let current = self.snapshot();
        match current.apply(event) {
            Some(next) => {
                let next = Arc::new(next);
                self.snapshot_tx.send_replace(Arc::clone(&next));
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
                trace!(
                    symbol = %event.symbol,
                    delta = event.delta_price,
                    version = next.version(),
                    "Applied delta"
                );
                next
            }
            None => {
                self.counters.ignored_unknown.fetch_add(1, Ordering::Relaxed);
                debug!(symbol = %event.symbol, "Ignoring delta for unknown symbol");
                current
            }
        }
    }

    /// Apply queued deltas one at a time until cancelled or every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<DeltaEvent>, cancel: CancellationToken) {
        info!(instruments = self.snapshot().len(), "Starting price aggregator");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.apply_delta(&event);
                    }
                    None => break,
                },
            }
        }

        let stats = self.reader().stats();
        info!(
            applied = stats.applied,
            ignored_unknown = stats.ignored_unknown,
            "Price aggregator stopped"
        );
    }

    pub fn spawn(
        self,
        events: mpsc::Receiver<DeltaEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(events, cancel))
    }
}

/// Read-only access to the published snapshots
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Arc<RankedSnapshot>>,
    counters: Arc<Counters>,
}

impl SnapshotReader {
    pub fn latest(&self) -> Arc<RankedSnapshot> {
        Arc::clone(&self.rx.borrow())
    }

    pub fn ranked(&self) -> Vec<RankedRow> {
        self.latest().rows()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<RankedSnapshot>> {
        self.rx.clone()
    }

    pub fn subscribe(&self, symbol: &str) -> CoreResult<PriceSubscription> {
        PriceSubscription::new(symbol, self.rx.clone())
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            ignored_unknown: self.counters.ignored_unknown.load(Ordering::Relaxed),
            version: self.rx.borrow().version(),
        }
    }
}
