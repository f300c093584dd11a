//! In-process WebSocket echo endpoint
//!
//! Stands in for a public echo service: every text or binary frame a channel
//! sends comes straight back, so generated deltas flow into the aggregator.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct EchoServer {
    addr: SocketAddr,
    active: Arc<AtomicUsize>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EchoServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let active = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(accept_loop(listener, Arc::clone(&active), cancel.clone()));
        info!(%addr, "Echo server listening");

        Ok(Self {
            addr,
            active,
            cancel,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr())
    }

    /// Currently open WebSocket sessions
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Stop accepting and drop every open session.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
        info!(addr = %self.addr, "Echo server stopped");
    }
}

async fn accept_loop(listener: TcpListener, active: Arc<AtomicUsize>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let active = Arc::clone(&active);
                    let cancel = cancel.child_token();
                    tokio::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);
                        if let Err(e) = echo_session(stream, cancel).await {
                            debug!(%peer, "Echo session ended: {}", e);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                Err(e) => {
                    warn!("Echo accept failed: {}", e);
                }
            },
        }
    }
}

async fn echo_session(stream: TcpStream, cancel: CancellationToken) -> anyhow::Result<()> {
    let ws = accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            msg = read.next() => match msg {
                Some(Ok(msg @ (Message::Text(_) | Message::Binary(_)))) => write.send(msg).await?,
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }
}
