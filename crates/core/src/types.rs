//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Instrument ticker symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(Arc::from(symbol.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl std::borrow::Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A tracked asset. Never mutated once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    pub company: String,
    pub description: String,
    pub base_price: f64,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<Symbol>,
        company: impl Into<String>,
        description: impl Into<String>,
        base_price: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            company: company.into(),
            description: description.into(),
            base_price,
        }
    }
}

/// Current and previous delta for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceState {
    pub symbol: Symbol,
    pub previous_delta: f64,
    pub current_delta: f64,
}

impl PriceState {
    pub fn zeroed(symbol: Symbol) -> Self {
        Self {
            symbol,
            previous_delta: 0.0,
            current_delta: 0.0,
        }
    }

    /// Successor state after receiving `delta`.
    pub fn advance(&self, delta: f64) -> Self {
        Self {
            symbol: self.symbol.clone(),
            previous_delta: self.current_delta,
            current_delta: delta,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::between(self.previous_delta, self.current_delta)
    }
}

/// Movement of the effective price relative to the previous update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn between(previous: f64, current: f64) -> Self {
        if current > previous {
            Direction::Up
        } else if current < previous {
            Direction::Down
        } else {
            Direction::Flat
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Up => "▲",
            Direction::Down => "▼",
            Direction::Flat => "•",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.arrow())
    }
}

/// A new price offset for one instrument, as carried on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub symbol: Symbol,
    pub delta_price: f64,
}

impl DeltaEvent {
    pub fn new(symbol: impl Into<Symbol>, delta_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            delta_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_shifts_current_into_previous() {
        let state = PriceState::zeroed(Symbol::new("AAA"));
        let state = state.advance(10.0).advance(-5.0);

        assert_eq!(state.previous_delta, 10.0);
        assert_eq!(state.current_delta, -5.0);
        assert_eq!(state.direction(), Direction::Down);
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::between(0.0, 1.5), Direction::Up);
        assert_eq!(Direction::between(3.0, -1.0), Direction::Down);
        assert_eq!(Direction::between(2.0, 2.0), Direction::Flat);
    }

    #[test]
    fn test_delta_event_wire_shape() {
        let event: DeltaEvent =
            serde_json::from_str(r#"{"symbol":"NVDA","delta_price":-12.5}"#).unwrap();
        assert_eq!(event, DeltaEvent::new("NVDA", -12.5));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["symbol"], "NVDA");
        assert_eq!(json["delta_price"], -12.5);
    }

    #[test]
    fn test_symbol_serializes_as_plain_string() {
        let symbol = Symbol::new("AAPL");
        assert_eq!(serde_json::to_string(&symbol).unwrap(), r#""AAPL""#);

        let parsed: Symbol = serde_json::from_str(r#""MSFT""#).unwrap();
        assert_eq!(parsed.as_str(), "MSFT");
    }
}
