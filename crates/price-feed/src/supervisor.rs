//! Connection supervisor - opens, closes and reconnects every channel together

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

use tracker_core::{DeltaEvent, FeedConfig, Instrument, Symbol};

use crate::channel::{ChannelContext, ChannelState, DeltaChannel};
use crate::generator::DeltaSourceFactory;
use crate::health::{ConnectionHealth, HealthMonitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Channels never opened
    Idle,
    Running,
    Stopped,
}

pub struct ConnectionSupervisor {
    instruments: Vec<Arc<Instrument>>,
    ctx: ChannelContext,
    channels: Vec<DeltaChannel>,
    state: SupervisorState,
}

impl ConnectionSupervisor {
    pub fn new(
        instruments: Vec<Arc<Instrument>>,
        config: FeedConfig,
        sources: Arc<dyn DeltaSourceFactory>,
        events: mpsc::Sender<DeltaEvent>,
    ) -> Self {
        let health = Arc::new(HealthMonitor::new(instruments.len()));
        Self {
            ctx: ChannelContext::new(config, sources, events, health),
            instruments,
            channels: Vec::new(),
            state: SupervisorState::Idle,
        }
    }

    /// Open one channel per instrument, or reconnect them after a stop.
    /// No-op while running.
    pub async fn start_all(&mut self) -> &[DeltaChannel] {
        match self.state {
            SupervisorState::Running => {}
            SupervisorState::Idle => self.open_channels(),
            SupervisorState::Stopped => self.reconnect_channels().await,
        }
        &self.channels
    }

    /// Reconnect every existing channel. Never creates duplicates.
    ///
    /// While running, only channels the remote closed or that errored are
    /// reconnected; live and connecting channels are left alone.
    pub async fn connect_all(&mut self) {
        match self.state {
            SupervisorState::Running => self.reconnect_dropped().await,
            SupervisorState::Idle => self.open_channels(),
            SupervisorState::Stopped => self.reconnect_channels().await,
        }
    }

    /// Close every channel. No-op unless running.
    pub async fn stop_all(&mut self) {
        if self.state != SupervisorState::Running {
            return;
        }

        let open = self.channels.iter().filter(|c| c.is_open()).count();
        self.ctx.health.set_total(open);
        info!(channels = open, "Stopping all channels");

        join_all(self.channels.iter_mut().map(|c| c.close())).await;
        self.state = SupervisorState::Stopped;

        info!(connected = self.health().connected, "All channels stopped");
    }

    fn open_channels(&mut self) {
        info!(
            channels = self.instruments.len(),
            url = %self.ctx.config.ws_url,
            "Opening channels"
        );
        self.ctx.health.set_total(self.instruments.len());
        self.channels = self
            .instruments
            .iter()
            .map(|instrument| DeltaChannel::open(Arc::clone(instrument), self.ctx.clone()))
            .collect();
        self.state = SupervisorState::Running;
    }

    async fn reconnect_channels(&mut self) {
        info!(channels = self.channels.len(), "Reconnecting channels");
        self.ctx.health.set_total(self.channels.len());
        join_all(self.channels.iter_mut().map(|c| c.reconnect())).await;
        self.state = SupervisorState::Running;
    }

    async fn reconnect_dropped(&mut self) {
        self.ctx.health.set_total(self.channels.len());
        let dropped: Vec<_> = self
            .channels
            .iter_mut()
            .filter(|c| c.state().is_dropped())
            .collect();
        if dropped.is_empty() {
            return;
        }

        info!(channels = dropped.len(), "Reconnecting dropped channels");
        join_all(dropped.into_iter().map(|c| c.reconnect())).await;
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SupervisorState::Running
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[DeltaChannel] {
        &self.channels
    }

    /// Channel states in catalog order
    pub fn channel_states(&self) -> Vec<(Symbol, ChannelState)> {
        self.channels
            .iter()
            .map(|c| (c.symbol().clone(), c.state()))
            .collect()
    }

    pub fn health(&self) -> ConnectionHealth {
        self.ctx.health.current()
    }

    pub fn watch_health(&self) -> watch::Receiver<ConnectionHealth> {
        self.ctx.health.subscribe()
    }

    pub fn health_monitor(&self) -> Arc<HealthMonitor> {
        Arc::clone(&self.ctx.health)
    }
}
