use std::path::PathBuf;

use serde::Deserialize;

use crate::error::TrackerError;
use crate::export::page::PageParams;

/// Application-level constants
pub const APP_NAME: &str = "tracker-core";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> String {
    std::env::var("TRACKER_LOG").unwrap_or_else(|_| "tracker_core=info".to_string())
}

/// Get the application data directory
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("tracker")
}

/// Default location of the tracker database
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("tracker.db")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime settings for the export services.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    pub database_path: PathBuf,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub log_filter: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            log_filter: default_log_filter(),
        }
    }
}

impl TrackerConfig {
    /// Load from a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overlaid with `TRACKER_DB_PATH`, `TRACKER_PAGE_SIZE` and `TRACKER_LOG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = lookup("TRACKER_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(size) = lookup("TRACKER_PAGE_SIZE") {
            self.default_page_size = size
                .parse()
                .ok()
                .filter(|s| *s > 0 && *s <= self.max_page_size)
                .ok_or(ConfigError::InvalidValue {
                    key: "TRACKER_PAGE_SIZE",
                    value: size,
                })?;
        }
        if let Some(filter) = lookup("TRACKER_LOG") {
            self.log_filter = filter;
        }
        Ok(self)
    }

    /// Page window from raw request values, bounded by `max_page_size`.
    pub fn page_params(
        &self,
        page: Option<u32>,
        page_size: Option<u32>,
        total_pages: bool,
    ) -> Result<PageParams, TrackerError> {
        PageParams::bounded(
            page.unwrap_or(1),
            page_size.unwrap_or(self.default_page_size),
            total_pages,
            self.max_page_size,
        )
    }
}
