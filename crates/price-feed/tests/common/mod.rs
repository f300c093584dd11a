//! Shared helpers for integration tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use tracker_core::{DeltaEvent, FeedConfig, Instrument};
use tracker_price_feed::{ChannelContext, DeltaSourceFactory, HealthMonitor};

pub fn instrument(symbol: &str, base_price: f64) -> Arc<Instrument> {
    Arc::new(Instrument::new(symbol, format!("{symbol} Corp"), "", base_price))
}

pub fn feed_config(url: String) -> FeedConfig {
    FeedConfig {
        ws_url: url,
        connect_timeout_ms: 2_000,
        close_timeout_ms: 200,
        event_buffer: 256,
    }
}

pub fn context(
    config: FeedConfig,
    sources: Arc<dyn DeltaSourceFactory>,
    channels: usize,
) -> (ChannelContext, mpsc::Receiver<DeltaEvent>) {
    let (tx, rx) = mpsc::channel(config.event_buffer);
    let health = Arc::new(HealthMonitor::new(channels));
    (ChannelContext::new(config, sources, tx, health), rx)
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Accepts TCP connections but never completes a WebSocket handshake.
pub async fn silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// Sends `frames` to every client after the handshake, then echoes.
pub async fn scripted_server(frames: Vec<Message>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let frames = frames.clone();
            tokio::spawn(async move {
                let Ok(ws) = accept_async(stream).await else {
                    return;
                };
                let (mut write, mut read) = ws.split();
                for frame in frames {
                    if write.send(frame).await.is_err() {
                        return;
                    }
                }
                while let Some(Ok(msg)) = read.next().await {
                    if msg.is_text() && write.send(msg).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}

/// Completes the handshake, then closes straight away.
pub async fn closing_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(mut ws) = accept_async(stream).await {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    let _ = ws.close(None).await;
                }
            });
        }
    });
    addr
}

/// Pings the first client once and reports how many pongs came back within `window`.
pub async fn pinging_server(window: Duration) -> (SocketAddr, oneshot::Receiver<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (pongs_tx, pongs_rx) = oneshot::channel();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = accept_async(stream).await else {
            return;
        };
        if ws.send(Message::Ping(b"hb".to_vec())).await.is_err() {
            return;
        }

        let mut pongs = 0;
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                msg = ws.next() => match msg {
                    Some(Ok(Message::Pong(_))) => pongs += 1,
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
        let _ = pongs_tx.send(pongs);

        // Hold the session open until the client leaves
        while let Some(Ok(_)) = ws.next().await {}
    });
    (addr, pongs_rx)
}

/// Closes the first `drops` sessions right after the handshake, then echoes.
pub async fn flaky_server(drops: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let session = accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                if session < drops {
                    let _ = ws.close(None).await;
                    return;
                }
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_text() && ws.send(msg).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}
