//! Price Tracker
//!
//! Main entry point: streams deltas for every catalog instrument and logs the ranked list

use std::env;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tracker_app::{load_settings, run_reporter};
use tracker_core::Catalog;
use tracker_price_feed::{EchoServer, PriceTracker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting Price Tracker v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_file = env::args().nth(1);
    let mut config = load_settings(config_file.as_deref())?;

    let catalog = Catalog::load(&config.catalog_path)
        .with_context(|| format!("Failed to load catalog from {}", config.catalog_path))?;
    info!(instruments = catalog.len(), path = %config.catalog_path, "Catalog loaded");

    let echo = if config.local_echo {
        let server = EchoServer::bind("127.0.0.1:0")
            .await
            .context("Failed to bind local echo server")?;
        config.feed.ws_url = server.url();
        info!(url = %config.feed.ws_url, "Local echo server listening");
        Some(server)
    } else {
        None
    };

    let tracker = Arc::new(PriceTracker::from_config(catalog, &config)?);
    tracker.start().await;
    info!(url = %config.feed.ws_url, channels = tracker.channel_count().await, "Channels started");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let reporter = tokio::spawn(run_reporter(
        Arc::clone(&tracker),
        config.report_interval(),
        config.report_top_n,
        shutdown_rx,
    ));

    wait_for_signal(&tracker).await;

    let _ = shutdown_tx.send(());
    if let Err(e) = reporter.await {
        error!("Reporter task failed: {}", e);
    }

    tracker.shutdown().await;
    if let Some(server) = echo {
        server.shutdown().await;
    }

    info!("Price Tracker shutdown complete");
    Ok(())
}

/// Block until Ctrl+C or SIGTERM. On unix, SIGHUP toggles the channels between started and stopped.
async fn wait_for_signal(tracker: &PriceTracker) {
    #[cfg(unix)]
    {
        use signal::unix::{signal as unix_signal, SignalKind};

        let (mut terminate, mut hangup) =
            match (unix_signal(SignalKind::terminate()), unix_signal(SignalKind::hangup())) {
                (Ok(terminate), Ok(hangup)) => (terminate, hangup),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Failed to install signal handlers: {}", e);
                    if let Err(e) = signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl+C: {}", e);
                    }
                    return;
                }
            };

        loop {
            tokio::select! {
                result = signal::ctrl_c() => {
                    if let Err(e) = result {
                        error!("Failed to listen for Ctrl+C: {}", e);
                    }
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM, shutting down...");
                    return;
                }
                _ = hangup.recv() => {
                    if tracker.is_running().await {
                        info!("Received SIGHUP, stopping channels");
                        tracker.stop().await;
                    } else {
                        info!("Received SIGHUP, starting channels");
                        tracker.start().await;
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tracker;
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Received Ctrl+C, shutting down...");
    }
}
