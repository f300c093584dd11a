//! Ranked, point-in-time view of all instruments
//!
//! Snapshots are immutable. An update produces a new snapshot that shares every
//! untouched `PriceState` with its predecessor, so consumers can tell changed
//! entries apart by pointer as well as by value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::{CoreError, CoreResult, DeltaEvent, Direction, Instrument, PriceState, Symbol};

/// One instrument with its latest price state
#[derive(Debug, Clone)]
pub struct RankedEntry {
    pub instrument: Arc<Instrument>,
    pub state: Arc<PriceState>,
    /// Position in the catalog, used as the tie-break
    pub catalog_index: usize,
}

impl RankedEntry {
    pub fn symbol(&self) -> &Symbol {
        &self.instrument.symbol
    }

    pub fn effective_price(&self) -> f64 {
        self.instrument.base_price + self.state.current_delta
    }

    pub fn row(&self) -> RankedRow {
        RankedRow {
            symbol: self.instrument.symbol.clone(),
            display_price: self.effective_price(),
            direction: self.state.direction(),
        }
    }

    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .effective_price()
            .total_cmp(&self.effective_price())
            .then(self.catalog_index.cmp(&other.catalog_index))
    }
}

impl PartialEq for RankedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.catalog_index == other.catalog_index
            && *self.instrument == *other.instrument
            && *self.state == *other.state
    }
}

/// Row handed to list renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub symbol: Symbol,
    pub display_price: f64,
    pub direction: Direction,
}

/// Entries sorted descending by effective price, catalog order on ties
#[derive(Debug, Clone)]
pub struct RankedSnapshot {
    version: u64,
    published_at: DateTime<Utc>,
    entries: Vec<RankedEntry>,
}

impl RankedSnapshot {
    /// Build the initial snapshot with every delta at zero.
    pub fn seed(instruments: Vec<Instrument>) -> CoreResult<Self> {
        let mut seen = HashSet::with_capacity(instruments.len());
        let mut entries = Vec::with_capacity(instruments.len());

        for (catalog_index, instrument) in instruments.into_iter().enumerate() {
            if !seen.insert(instrument.symbol.clone()) {
                return Err(CoreError::DuplicateSymbol(instrument.symbol));
            }
            entries.push(RankedEntry {
                state: Arc::new(PriceState::zeroed(instrument.symbol.clone())),
                instrument: Arc::new(instrument),
                catalog_index,
            });
        }

        entries.sort_by(RankedEntry::rank_cmp);

        Ok(Self {
            version: 0,
            published_at: Utc::now(),
            entries,
        })
    }

    /// Successor snapshot with `event` applied, or `None` if the symbol is unknown.
    pub fn apply(&self, event: &DeltaEvent) -> Option<Self> {
        let position = self.position(event.symbol.as_str())?;

        let mut entries = self.entries.clone();
        let entry = &mut entries[position];
        entry.state = Arc::new(entry.state.advance(event.delta_price));
        entries.sort_by(RankedEntry::rank_cmp);

        Some(Self {
            version: self.version + 1,
            published_at: Utc::now(),
            entries,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, symbol: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.symbol().as_str() == symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&RankedEntry> {
        self.entries.iter().find(|e| e.symbol().as_str() == symbol)
    }

    pub fn state_of(&self, symbol: &str) -> Option<&Arc<PriceState>> {
        self.get(symbol).map(|e| &e.state)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.entries.iter().map(|e| e.symbol().clone()).collect()
    }

    pub fn rows(&self) -> Vec<RankedRow> {
        self.entries.iter().map(RankedEntry::row).collect()
    }

    /// Whether entries are in rank order. Always true for snapshots built here.
    pub fn is_ranked(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[0].rank_cmp(&w[1]) == Ordering::Less)
    }
}

/// Value equality over the entries; version and timestamp are ignored.
impl PartialEq for RankedSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn instruments(prices: &[(&str, f64)]) -> Vec<Instrument> {
        prices
            .iter()
            .map(|(s, p)| Instrument::new(*s, format!("{s} Inc."), "", *p))
            .collect()
    }

    #[test]
    fn test_seed_sorts_by_base_price() {
        let snapshot =
            RankedSnapshot::seed(instruments(&[("LOW", 5.0), ("HIGH", 500.0), ("MID", 50.0)]))
                .unwrap();

        let symbols: Vec<_> = snapshot.symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(symbols, vec!["HIGH", "MID", "LOW"]);
        assert!(snapshot.entries().iter().all(|e| e.state.current_delta == 0.0));
        assert_eq!(snapshot.version(), 0);
    }

    #[test]
    fn test_seed_rejects_duplicates() {
        let result = RankedSnapshot::seed(instruments(&[("AAA", 1.0), ("AAA", 2.0)]));
        assert!(matches!(result, Err(CoreError::DuplicateSymbol(_))));
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let snapshot =
            RankedSnapshot::seed(instruments(&[("B", 10.0), ("A", 10.0), ("C", 10.0)])).unwrap();
        let symbols: Vec<_> = snapshot.symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(symbols, vec!["B", "A", "C"]);

        // A moves level with B: catalog order still decides
        let snapshot = snapshot.apply(&DeltaEvent::new("C", 5.0)).unwrap();
        let snapshot = snapshot.apply(&DeltaEvent::new("A", 5.0)).unwrap();
        let symbols: Vec<_> = snapshot.symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(symbols, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_apply_keeps_unrelated_states_shared() {
        let seeded =
            RankedSnapshot::seed(instruments(&[("AAA", 100.0), ("BBB", 50.0)])).unwrap();
        let next = seeded.apply(&DeltaEvent::new("BBB", 60.0)).unwrap();

        let before = seeded.state_of("AAA").unwrap();
        let after = next.state_of("AAA").unwrap();
        assert!(Arc::ptr_eq(before, after));
        assert!(!Arc::ptr_eq(
            seeded.state_of("BBB").unwrap(),
            next.state_of("BBB").unwrap()
        ));
        assert_eq!(next.version(), 1);
        assert!(next.published_at() >= seeded.published_at());
    }

    #[test]
    fn test_apply_finds_symbol_by_event() {
        let seeded =
            RankedSnapshot::seed(instruments(&[("AAA", 100.0), ("BBB", 50.0)])).unwrap();
        let next = seeded.apply(&DeltaEvent::new(Symbol::new("AAA"), -7.5)).unwrap();

        assert_eq!(next.position("AAA"), Some(0));
        assert_eq!(next.state_of("AAA").unwrap().current_delta, -7.5);
    }

    #[test]
    fn test_apply_unknown_symbol() {
        let seeded = RankedSnapshot::seed(instruments(&[("AAA", 100.0)])).unwrap();
        assert!(seeded.apply(&DeltaEvent::new("ZZZ", 5.0)).is_none());
    }

    #[test]
    fn test_rows() {
        let seeded =
            RankedSnapshot::seed(instruments(&[("AAA", 100.0), ("BBB", 50.0)])).unwrap();
        let next = seeded.apply(&DeltaEvent::new("BBB", 60.0)).unwrap();

        let rows = next.rows();
        assert_eq!(rows[0].symbol.as_str(), "BBB");
        assert_eq!(rows[0].display_price, 110.0);
        assert_eq!(rows[0].direction, Direction::Up);
        assert_eq!(rows[1].direction, Direction::Flat);
    }

    proptest! {
        #[test]
        fn prop_always_ranked(
            bases in prop::collection::vec(0.0f64..1_000.0, 1..12),
            deltas in prop::collection::vec((0usize..12, -20.0f64..20.0), 0..64),
        ) {
            let catalog: Vec<Instrument> = bases
                .iter()
                .enumerate()
                .map(|(i, p)| Instrument::new(format!("S{i}"), "", "", *p))
                .collect();
            let mut snapshot = RankedSnapshot::seed(catalog).unwrap();
            prop_assert!(snapshot.is_ranked());

            for (idx, delta) in deltas {
                let event = DeltaEvent::new(format!("S{}", idx % bases.len()), delta);
                snapshot = snapshot.apply(&event).unwrap();
                prop_assert!(snapshot.is_ranked());
                prop_assert_eq!(snapshot.len(), bases.len());
            }
        }
    }
}
