//! Per-instrument WebSocket delta channel
//!
//! Each channel owns at most one live connection task. The task connects with
//! a bounded timeout, sends the generator's deltas outbound, forwards every
//! well-formed inbound delta to the aggregator queue and reports connectivity
//! to the health monitor. Closing cancels the task and waits for it, so no
//! generator timer survives the connection it belongs to.

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tracker_core::{ChannelError, ChannelResult, DeltaEvent, FeedConfig, Instrument, Symbol};

use crate::codec;
use crate::generator::DeltaSourceFactory;
use crate::health::HealthMonitor;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of one streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Cancelled,
    Errored,
}

impl ChannelState {
    pub fn is_active(&self) -> bool {
        matches!(self, ChannelState::Connecting | ChannelState::Connected)
    }

    /// No live connection and none being made
    pub fn is_dropped(&self) -> bool {
        matches!(
            self,
            ChannelState::Disconnected | ChannelState::Cancelled | ChannelState::Errored
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Disconnecting => "disconnecting",
            ChannelState::Disconnected => "disconnected",
            ChannelState::Cancelled => "cancelled",
            ChannelState::Errored => "errored",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wiring shared by every channel of one supervisor
#[derive(Clone)]
pub struct ChannelContext {
    pub config: FeedConfig,
    pub sources: Arc<dyn DeltaSourceFactory>,
    pub events: mpsc::Sender<DeltaEvent>,
    pub health: Arc<HealthMonitor>,
    pub states: Arc<DashMap<Symbol, ChannelState>>,
}

impl ChannelContext {
    pub fn new(
        config: FeedConfig,
        sources: Arc<dyn DeltaSourceFactory>,
        events: mpsc::Sender<DeltaEvent>,
        health: Arc<HealthMonitor>,
    ) -> Self {
        Self {
            config,
            sources,
            events,
            health,
            states: Arc::new(DashMap::new()),
        }
    }

    fn set_state(&self, symbol: &Symbol, state: ChannelState) {
        self.states.insert(symbol.clone(), state);
    }

    fn state(&self, symbol: &Symbol) -> ChannelState {
        self.states
            .get(symbol)
            .map(|s| *s.value())
            .unwrap_or(ChannelState::Idle)
    }
}

struct Connection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// One streaming connection bound to one instrument
pub struct DeltaChannel {
    instrument: Arc<Instrument>,
    ctx: ChannelContext,
    connection: Option<Connection>,
    generation: u64,
}

impl DeltaChannel {
    /// Bind a channel to `instrument` and start connecting.
    pub fn open(instrument: Arc<Instrument>, ctx: ChannelContext) -> Self {
        ctx.set_state(&instrument.symbol, ChannelState::Idle);
        let mut channel = Self {
            instrument,
            ctx,
            connection: None,
            generation: 0,
        };
        channel.spawn_connection();
        channel
    }

    pub fn symbol(&self) -> &Symbol {
        &self.instrument.symbol
    }

    pub fn state(&self) -> ChannelState {
        self.ctx.state(&self.instrument.symbol)
    }

    /// Number of connections this channel has started
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a connection task is owned, i.e. the channel has not been closed.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Shut the connection down. Safe to call repeatedly and from any state.
    pub async fn close(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        connection.cancel.cancel();
        let grace = self.ctx.config.close_timeout() + Duration::from_millis(100);
        if tokio::time::timeout(grace, &mut connection.task).await.is_err() {
            warn!(symbol = %self.symbol(), "Connection task did not stop in time, aborting");
            connection.task.abort();
            let _ = connection.task.await;
            if self.state().is_active() || self.state() == ChannelState::Disconnecting {
                self.ctx.set_state(self.symbol(), ChannelState::Disconnected);
            }
        }

        self.ctx.health.report(self.symbol(), false);
    }

    /// Close if needed, then connect again with a fresh connection.
    pub async fn reconnect(&mut self) {
        self.close().await;
        self.spawn_connection();
    }

    fn spawn_connection(&mut self) {
        self.generation += 1;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            Arc::clone(&self.instrument),
            self.ctx.clone(),
            cancel.clone(),
        ));
        self.connection = Some(Connection { cancel, task });
    }
}

impl Drop for DeltaChannel {
    fn drop(&mut self) {
        if let Some(connection) = &self.connection {
            connection.cancel.cancel();
        }
    }
}

impl fmt::Debug for DeltaChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeltaChannel")
            .field("symbol", self.symbol())
            .field("state", &self.state())
            .field("generation", &self.generation)
            .finish()
    }
}

/// How a connected stream ended without a transport error
enum StreamEnd {
    Cancelled,
    RemoteClosed,
    QueueClosed,
}

async fn run_connection(instrument: Arc<Instrument>, ctx: ChannelContext, cancel: CancellationToken) {
    let symbol = &instrument.symbol;
    ctx.set_state(symbol, ChannelState::Connecting);

    let ws = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(%symbol, "Connect cancelled");
            ctx.set_state(symbol, ChannelState::Cancelled);
            ctx.health.report(symbol, false);
            return;
        }
        result = connect(&ctx.config) => match result {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%symbol, "Channel connect failed: {}", e);
                ctx.set_state(symbol, ChannelState::Errored);
                ctx.health.report(symbol, false);
                return;
            }
        }
    };

    info!(%symbol, url = %ctx.config.ws_url, "Channel connected");
    ctx.set_state(symbol, ChannelState::Connected);
    ctx.health.report(symbol, true);

    match stream_deltas(ws, &instrument, &ctx, &cancel).await {
        Ok(StreamEnd::Cancelled) => {
            debug!(%symbol, "Channel closed");
            ctx.set_state(symbol, ChannelState::Disconnected);
        }
        Ok(StreamEnd::RemoteClosed) => {
            info!(%symbol, "Channel closed by remote");
            ctx.set_state(symbol, ChannelState::Disconnected);
        }
        Ok(StreamEnd::QueueClosed) => {
            debug!(%symbol, "Aggregator queue closed, dropping channel");
            ctx.set_state(symbol, ChannelState::Disconnected);
        }
        Err(e) => {
            warn!(%symbol, "Channel error: {}", e);
            ctx.set_state(symbol, ChannelState::Errored);
        }
    }
    ctx.health.report(symbol, false);
}

async fn connect(config: &FeedConfig) -> ChannelResult<WsStream> {
    let timeout = config.connect_timeout();
    match tokio::time::timeout(timeout, connect_async(config.ws_url.as_str())).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(ChannelError::ConnectionFailed(e.to_string())),
        Err(_) => Err(ChannelError::ConnectTimeout {
            url: config.ws_url.clone(),
            timeout_ms: config.connect_timeout_ms,
        }),
    }
}

async fn stream_deltas(
    ws: WsStream,
    instrument: &Instrument,
    ctx: &ChannelContext,
    cancel: &CancellationToken,
) -> ChannelResult<StreamEnd> {
    let symbol = &instrument.symbol;
    let (mut write, mut read) = ws.split();
    let mut source = ctx.sources.create(instrument);
    let mut source_done = false;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                ctx.set_state(symbol, ChannelState::Disconnecting);
                let close = write.send(Message::Close(None));
                if tokio::time::timeout(ctx.config.close_timeout(), close).await.is_err() {
                    debug!(%symbol, "Close handshake timed out");
                }
                return Ok(StreamEnd::Cancelled);
            }

            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if !forward(&text, symbol, ctx).await {
                        return Ok(StreamEnd::QueueClosed);
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let forwarded = match std::str::from_utf8(&bytes) {
                        Ok(text) => forward(text, symbol, ctx).await,
                        Err(_) => {
                            debug!(%symbol, len = bytes.len(), "Dropping non-UTF-8 frame");
                            true
                        }
                    };
                    if !forwarded {
                        return Ok(StreamEnd::QueueClosed);
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(StreamEnd::RemoteClosed),
                // Pongs to pings are queued by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ChannelError::ReceiveFailed(e.to_string())),
            },

            delta = source.next_delta(), if !source_done => match delta {
                Some(delta_price) => {
                    let event = DeltaEvent { symbol: symbol.clone(), delta_price };
                    let frame = codec::encode(&event)
                        .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
                    write
                        .send(frame)
                        .await
                        .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
                    debug!(%symbol, delta_price, "Sent delta");
                }
                None => source_done = true,
            },
        }
    }
}

/// Hand a payload to the aggregator queue. Returns `false` once the queue is gone.
async fn forward(payload: &str, symbol: &Symbol, ctx: &ChannelContext) -> bool {
    match codec::decode(payload) {
        Some(event) => ctx.events.send(event).await.is_ok(),
        None => {
            debug!(%symbol, payload, "Dropping malformed message");
            true
        }
    }
}
