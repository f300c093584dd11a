//! Live price feed aggregator
//!
//! Features:
//! - One WebSocket channel per instrument with bounded connect timeouts
//! - Pluggable delta sources (jittered random generator by default)
//! - Single-writer aggregator publishing immutable ranked snapshots
//! - Deduplicated per-instrument subscriptions and highlight pulses
//! - Global start/stop with connection health accounting

pub mod aggregator;
pub mod channel;
pub mod codec;
pub mod echo;
pub mod generator;
pub mod health;
pub mod highlight;
pub mod subscription;
pub mod supervisor;
pub mod tracker;

pub use aggregator::{AggregatorStats, PriceAggregator, SnapshotReader};
pub use channel::{ChannelContext, ChannelState, DeltaChannel};
pub use echo::EchoServer;
pub use generator::{DeltaSource, DeltaSourceFactory, RandomDeltaGenerator, ReceiveOnly};
pub use health::{ConnectionHealth, HealthMonitor};
pub use highlight::Highlight;
pub use subscription::PriceSubscription;
pub use supervisor::{ConnectionSupervisor, SupervisorState};
pub use tracker::PriceTracker;
