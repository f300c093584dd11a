//! Price tracker - the control surface handed to presentation layers
//!
//! Wires the aggregator, supervisor and subscriptions together:
//! - `start` / `stop` connect and disconnect every channel
//! - `ranked` / `snapshot` read the latest published ranking
//! - `subscribe` / `highlight` scope updates to one symbol
//! - `health` reports connected channels against the expected total

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tracker_core::{
    Catalog, CoreResult, FeedConfig, HighlightConfig, Instrument, RankedRow, RankedSnapshot,
    Symbol, TrackerConfig,
};

use crate::aggregator::{AggregatorStats, PriceAggregator, SnapshotReader};
use crate::channel::ChannelState;
use crate::generator::{DeltaSourceFactory, RandomDeltaGenerator};
use crate::health::{ConnectionHealth, HealthMonitor};
use crate::highlight::Highlight;
use crate::subscription::PriceSubscription;
use crate::supervisor::ConnectionSupervisor;

pub struct PriceTracker {
    reader: SnapshotReader,
    supervisor: tokio::sync::Mutex<ConnectionSupervisor>,
    health: Arc<HealthMonitor>,
    highlight: HighlightConfig,
    cancel: CancellationToken,
    aggregator_task: Mutex<Option<JoinHandle<()>>>,
}

impl PriceTracker {
    /// Seed the aggregator and start its writer task. Channels stay closed
    /// until [`start`](Self::start).
    pub fn new(
        instruments: Vec<Instrument>,
        feed: FeedConfig,
        highlight: HighlightConfig,
        sources: Arc<dyn DeltaSourceFactory>,
    ) -> CoreResult<Self> {
        let aggregator = PriceAggregator::seed(instruments)?;
        let reader = aggregator.reader();
        let instruments = aggregator.instruments();

        let (events_tx, events_rx) = mpsc::channel(feed.event_buffer.max(1));
        let supervisor = ConnectionSupervisor::new(instruments, feed, sources, events_tx);
        let health = supervisor.health_monitor();

        let cancel = CancellationToken::new();
        let aggregator_task = aggregator.spawn(events_rx, cancel.clone());

        Ok(Self {
            reader,
            supervisor: tokio::sync::Mutex::new(supervisor),
            health,
            highlight,
            cancel,
            aggregator_task: Mutex::new(Some(aggregator_task)),
        })
    }

    /// Build a tracker driven by the random delta generator.
    pub fn from_config(catalog: Catalog, config: &TrackerConfig) -> CoreResult<Self> {
        let generator = RandomDeltaGenerator::new(config.generator.clone())?;
        Self::new(
            catalog.into_instruments(),
            config.feed.clone(),
            config.highlight.clone(),
            Arc::new(generator),
        )
    }

    /// Connect every channel.
    pub async fn start(&self) {
        self.supervisor.lock().await.start_all().await;
    }

    /// Disconnect every channel.
    pub async fn stop(&self) {
        self.supervisor.lock().await.stop_all().await;
    }

    pub async fn is_running(&self) -> bool {
        self.supervisor.lock().await.is_running()
    }

    pub fn ranked(&self) -> Vec<RankedRow> {
        self.reader.ranked()
    }

    pub fn snapshot(&self) -> Arc<RankedSnapshot> {
        self.reader.latest()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<Arc<RankedSnapshot>> {
        self.reader.watch()
    }

    pub fn subscribe(&self, symbol: &str) -> CoreResult<PriceSubscription> {
        self.reader.subscribe(symbol)
    }

    pub fn highlight(&self, symbol: &str) -> CoreResult<Highlight> {
        let subscription = self.subscribe(symbol)?;
        Ok(Highlight::spawn(subscription, self.highlight.pulse()))
    }

    pub fn health(&self) -> ConnectionHealth {
        self.health.current()
    }

    pub fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }

    pub fn watch_health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health.subscribe()
    }

    pub async fn channel_count(&self) -> usize {
        self.supervisor.lock().await.channel_count()
    }

    pub async fn channel_states(&self) -> Vec<(Symbol, ChannelState)> {
        self.supervisor.lock().await.channel_states()
    }

    pub fn stats(&self) -> AggregatorStats {
        self.reader.stats()
    }

    /// Stop all channels and the aggregator. Reads keep returning the last
    /// published snapshot.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.cancel.cancel();

        let task = self.aggregator_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("Price tracker shut down");
    }
}

impl Drop for PriceTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
