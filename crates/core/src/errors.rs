//! Error types

use thiserror::Error;

use crate::Symbol;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(Symbol),

    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(Symbol),

    #[error("Invalid base price for {symbol}: {price}")]
    InvalidBasePrice { symbol: Symbol, price: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog record {index} has an empty symbol")]
    EmptySymbol { index: usize },

    #[error("Catalog is empty")]
    Empty,

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Streaming channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Connect to {url} timed out after {timeout_ms}ms")]
    ConnectTimeout { url: String, timeout_ms: u64 },

    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Closed by remote")]
    RemoteClosed,
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type CatalogResult<T> = Result<T, CatalogError>;
pub type ChannelResult<T> = Result<T, ChannelError>;
