//! Price tracker application
//!
//! Settings loading and the periodic console report used by the `price-tracker` binary.

pub mod report;
pub mod settings;

pub use report::{describe_health, render_rows, run_reporter};
pub use settings::{load_settings, SettingsError, DEFAULT_CONFIG_FILE};
