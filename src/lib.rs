pub mod acl;
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod uid;
pub mod validation;

pub use error::TrackerError;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber with the default configuration.
pub fn init_tracing() {
    init_tracing_with(&config::TrackerConfig::default());
}

/// Install the global tracing subscriber. `RUST_LOG` wins over
/// `log_filter`. Safe to call more than once.
pub fn init_tracing_with(config: &config::TrackerConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .try_init();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_installs_from_config_once() {
        let config = config::TrackerConfig::from_json_str(r#"{"logFilter": "tracker_core=debug"}"#).unwrap();
        init_tracing_with(&config);
        init_tracing();
    }
}
