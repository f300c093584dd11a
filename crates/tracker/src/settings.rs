//! Layered settings: defaults, optional config file, then `TRACKER__*` env vars

use config::{Config, Environment, File};
use thiserror::Error;

use tracker_core::{CoreError, TrackerConfig};

pub const DEFAULT_CONFIG_FILE: &str = "config/tracker";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Load the tracker configuration.
///
/// `TRACKER__FEED__WS_URL=ws://...` overrides `feed.ws_url`, and so on.
pub fn load_settings(config_file: Option<&str>) -> Result<TrackerConfig, SettingsError> {
    let path = config_file.unwrap_or(DEFAULT_CONFIG_FILE);

    let settings = Config::builder()
        .set_default("catalog_path", "data/stocks.json")?
        .set_default("report_interval_ms", 5_000i64)?
        .set_default("report_top_n", 10i64)?
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("TRACKER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: TrackerConfig = settings.try_deserialize()?;
    config.generator.validate()?;
    if config.catalog_path.is_empty() {
        return Err(CoreError::InvalidConfig("catalog_path must be set".into()).into());
    }
    Ok(config)
}
