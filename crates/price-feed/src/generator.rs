//! Outbound delta sources
//!
//! A channel asks its source for the next delta and sends it over the wire.
//! `RandomDeltaGenerator` simulates a market with a jittered timer. A real
//! market-data adapter plugs in through the same two traits.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::Instant;

use tracker_core::{CoreResult, GeneratorConfig, Instrument};

/// Produces outbound deltas for one connection.
#[async_trait]
pub trait DeltaSource: Send {
    /// Wait for the next delta. Must be cancel-safe: dropping the future and
    /// calling again must not lose or reschedule a pending tick.
    async fn next_delta(&mut self) -> Option<f64>;
}

/// Creates a fresh source for every connection a channel opens.
pub trait DeltaSourceFactory: Send + Sync {
    fn create(&self, instrument: &Instrument) -> Box<dyn DeltaSource>;
}

/// Uniform random deltas on a jittered timer
#[derive(Debug, Clone)]
pub struct RandomDeltaGenerator {
    config: GeneratorConfig,
}

impl RandomDeltaGenerator {
    pub fn new(config: GeneratorConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl DeltaSourceFactory for RandomDeltaGenerator {
    fn create(&self, instrument: &Instrument) -> Box<dyn DeltaSource> {
        let rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ symbol_hash(instrument.symbol.as_str())),
            None => StdRng::from_os_rng(),
        };
        Box::new(RandomDeltaSource::new(&self.config, rng))
    }
}

/// FNV-1a, so seeded runs differ per symbol but stay reproducible.
fn symbol_hash(symbol: &str) -> u64 {
    symbol.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

pub struct RandomDeltaSource {
    rng: StdRng,
    period_ms: u64,
    jitter_ms: u64,
    max_delta: f64,
    next_tick: Instant,
}

impl RandomDeltaSource {
    fn new(config: &GeneratorConfig, rng: StdRng) -> Self {
        let mut source = Self {
            rng,
            period_ms: config.period_ms,
            jitter_ms: config.jitter_ms,
            max_delta: config.max_delta,
            next_tick: Instant::now(),
        };
        source.next_tick = Instant::now() + source.jittered_period();
        source
    }

    fn jittered_period(&mut self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::from_millis(self.period_ms);
        }
        let jitter = self.jitter_ms as i64;
        let offset = self.rng.random_range(-jitter..=jitter);
        Duration::from_millis((self.period_ms as i64 + offset).max(1) as u64)
    }

    fn sample(&mut self) -> f64 {
        self.rng.random_range(-self.max_delta..=self.max_delta)
    }
}

#[async_trait]
impl DeltaSource for RandomDeltaSource {
    async fn next_delta(&mut self) -> Option<f64> {
        tokio::time::sleep_until(self.next_tick).await;
        let delta = self.sample();
        self.next_tick = Instant::now() + self.jittered_period();
        Some(delta)
    }
}

/// Never emits; for feeds that only push inbound.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveOnly;

#[async_trait]
impl DeltaSource for ReceiveOnly {
    async fn next_delta(&mut self) -> Option<f64> {
        std::future::pending().await
    }
}

impl DeltaSourceFactory for ReceiveOnly {
    fn create(&self, _instrument: &Instrument) -> Box<dyn DeltaSource> {
        Box::new(ReceiveOnly)
    }
}
