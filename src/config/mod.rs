//! Configuration management for hubdeck
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use hubdeck::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Dashboard at: {}", config.server.dashboard_url());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `HUBDECK__<section>__<key>`
//!
//! Examples:
//! - `HUBDECK__SERVER__BIND_ADDR=127.0.0.1:9000`
//! - `HUBDECK__REMOTE__BASE_URL=https://www.runninghub.ai`
//! - `HUBDECK__SUPERVISOR__OPEN_BROWSER=false`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/hubdeck.toml`.
//! This can be overridden using the `HUBDECK_CONFIG` environment variable.
//!
//! The category → directory mapping edited from the dashboard is not part of
//! this configuration; it is owned by [`crate::storage::PathStore`].

mod models;
mod sources;
mod validation;

// Re-export public types
pub use models::{
    Config, ControlConfig, RemoteSettings, ServerConfig, StorageSettings, SupervisorConfig,
};
pub use sources::default_path;
pub use validation::ValidationError;

use std::time::Duration;

use thiserror::Error;

use crate::remote::RemoteConfig;
use crate::storage::StorageLayout;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Failed to render configuration: {0}")]
    RenderError(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`HUBDECK__*`)
    /// 2. TOML file (default: `config/hubdeck.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Effective configuration as TOML, for `hubdeck config`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn storage_layout(&self) -> StorageLayout {
        StorageLayout {
            root: self.server.install_root.clone(),
            settings_file: self.storage.settings_file.clone(),
            proxy_prefix: self.storage.proxy_prefix.clone(),
            inputs_dir: self.storage.inputs_dir.clone(),
        }
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            base_url: self.remote.base_url.clone(),
            host_header: self.remote.host_header.clone(),
            connect_timeout: Duration::from_secs(self.remote.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.remote.request_timeout_secs),
            ..RemoteConfig::default()
        }
    }

    /// Web assets directory, relative paths taken from the install root.
    pub fn web_dir(&self) -> std::path::PathBuf {
        if self.server.web_dir.is_absolute() {
            self.server.web_dir.clone()
        } else {
            self.server.install_root.join(&self.server.web_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:8051"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.server.bind_addr.port(), 8051);
        assert_eq!(config.storage.proxy_prefix, "outputs_proxy");
    }

    #[test]
    fn test_validation_catches_bad_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[storage]
proxy_prefix = "a/b"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidProxyPrefix { .. })
        ));
    }

    #[test]
    fn test_render_round_trips() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.server.bind_addr, config.server.bind_addr);
        assert_eq!(parsed.supervisor.max_unexpected_restarts, 3);
    }

    #[test]
    fn test_derived_settings() {
        let mut config = Config::default();
        config.server.install_root = "/opt/hubdeck".into();
        config.remote.request_timeout_secs = 7;

        assert_eq!(config.web_dir(), std::path::PathBuf::from("/opt/hubdeck/web"));
        assert_eq!(config.remote_config().request_timeout, Duration::from_secs(7));
        assert_eq!(config.storage_layout().proxy_prefix, "outputs_proxy");
    }
}
