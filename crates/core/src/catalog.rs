//! Static instrument catalog

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::{CatalogError, CatalogResult, CoreError, Instrument, Symbol};

/// One catalog record as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub symbol: String,
    pub company: String,
    #[serde(default)]
    pub description: String,
    pub initial_price: f64,
}

/// Validated instruments in file order
#[derive(Debug, Clone)]
pub struct Catalog {
    instruments: Vec<Instrument>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> CatalogResult<Self> {
        let records: Vec<CatalogRecord> = serde_json::from_str(raw)?;
        Self::from_records(records)
    }

    pub fn from_records(records: Vec<CatalogRecord>) -> CatalogResult<Self> {
        if records.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::with_capacity(records.len());
        let mut instruments = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let symbol = record.symbol.trim();
            if symbol.is_empty() {
                return Err(CatalogError::EmptySymbol { index });
            }
            let symbol = Symbol::new(symbol);

            if !record.initial_price.is_finite() || record.initial_price < 0.0 {
                return Err(CoreError::InvalidBasePrice {
                    symbol,
                    price: record.initial_price,
                }
                .into());
            }
            if !seen.insert(symbol.clone()) {
                return Err(CoreError::DuplicateSymbol(symbol).into());
            }

            instruments.push(Instrument {
                symbol,
                company: record.company,
                description: record.description,
                base_price: record.initial_price,
            });
        }

        Ok(Self { instruments })
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn into_instruments(self) -> Vec<Instrument> {
        self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
