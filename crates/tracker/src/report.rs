//! Periodic ranked-list and health reporting

use std::sync::Arc;
use std::time::Duration;
use futures::StreamExt;
use tokio::sync::oneshot;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

use tracker_core::RankedRow;
use tracker_price_feed::{ConnectionHealth, PriceTracker};

pub fn render_rows(rows: &[RankedRow], top_n: usize) -> Vec<String> {
    rows.iter()
        .take(top_n)
        .enumerate()
        .map(|(rank, row)| {
            format!(
                "{:>3}. {:<8} {:>10.2} {}",
                rank + 1,
                row.symbol,
                row.display_price,
                row.direction
            )
        })
        .collect()
}

pub fn describe_health(health: ConnectionHealth) -> String {
    let label = if health.is_healthy() { "healthy" } else { "degraded" };
    format!("{} {}/{}", label, health.connected, health.total)
}

/// Log the top rows every `interval` and every health transition until shutdown.
pub async fn run_reporter(
    tracker: Arc<PriceTracker>,
    interval: Duration,
    top_n: usize,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut health = WatchStream::new(tracker.watch_health());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = tracker.stats();
                let snapshot = tracker.snapshot();
                info!(
                    version = snapshot.version(),
                    published_at = %snapshot.published_at().format("%H:%M:%S%.3f"),
                    applied = stats.applied,
                    health = %describe_health(tracker.health()),
                    "Ranked prices"
                );
                for line in render_rows(&snapshot.rows(), top_n) {
                    info!("{}", line);
                }
            }
            Some(current) = health.next() => {
                if current.is_healthy() {
                    info!(health = %describe_health(current), "Connection health");
                } else {
                    warn!(health = %describe_health(current), "Connection health");
                }
            }
            _ = &mut shutdown => {
                info!("Reporter shutdown requested");
                break;
            }
        }
    }
}
