//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::CoreError;

/// Per-instrument streaming connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub ws_url: String,
    pub connect_timeout_ms: u64,
    pub close_timeout_ms: u64,
    /// Capacity of the shared queue feeding the aggregator
    pub event_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws.postman-echo.com/raw".to_string(),
            connect_timeout_ms: 5_000,
            close_timeout_ms: 1_000,
            event_buffer: 1_024,
        }
    }
}

impl FeedConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

/// Synthetic delta generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub period_ms: u64,
    /// Each tick is offset by a uniform value in `[-jitter_ms, +jitter_ms]`
    pub jitter_ms: u64,
    /// Deltas are drawn uniformly from `[-max_delta, +max_delta]`
    pub max_delta: f64,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            period_ms: 2_000,
            jitter_ms: 500,
            max_delta: 20.0,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.period_ms == 0 {
            return Err(CoreError::InvalidConfig("period_ms must be positive".into()));
        }
        if self.jitter_ms >= self.period_ms {
            return Err(CoreError::InvalidConfig(format!(
                "jitter_ms ({}) must be below period_ms ({})",
                self.jitter_ms, self.period_ms
            )));
        }
        if !self.max_delta.is_finite() || self.max_delta < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "max_delta must be finite and non-negative, got {}",
                self.max_delta
            )));
        }
        Ok(())
    }
}

/// Transient highlight settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub pulse_ms: u64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self { pulse_ms: 500 }
    }
}

impl HighlightConfig {
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }
}

/// Complete tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub catalog_path: String,
    /// Serve channels from an in-process echo endpoint instead of `feed.ws_url`
    pub local_echo: bool,
    pub report_interval_ms: u64,
    pub report_top_n: usize,
    pub feed: FeedConfig,
    pub generator: GeneratorConfig,
    pub highlight: HighlightConfig,
}

impl TrackerConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(100))
    }
}
