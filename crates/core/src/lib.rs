//! Core types and utilities for the live price tracker
//!
//! This crate provides shared types used across all components:
//! - Instrument, price state and delta event definitions
//! - The ranked snapshot and its ordering rules
//! - Catalog loading
//! - Configuration and error types

pub mod types;
pub mod snapshot;
pub mod catalog;
pub mod config;
pub mod errors;

pub use types::*;
pub use snapshot::*;
pub use catalog::*;
pub use config::*;
pub use errors::*;
