use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "HUBDECK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/hubdeck.toml";
const ENV_PREFIX: &str = "HUBDECK";
const ENV_SEPARATOR: &str = "__";

/// Path of the TOML file: `HUBDECK_CONFIG` or `config/hubdeck.toml`.
pub fn default_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    load_from_sources(default_path())
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // HUBDECK__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8050");
        assert_eq!(config.remote.base_url, "https://www.runninghub.cn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"
install_root = "/opt/hubdeck"

[storage]
proxy_prefix = "files"

[remote]
base_url = "http://127.0.0.1:7000"
request_timeout_secs = 5

[supervisor]
open_browser = false
restart_delay_ms = 500
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.server.install_root, PathBuf::from("/opt/hubdeck"));
        assert_eq!(config.storage.proxy_prefix, "files");
        assert_eq!(config.remote.request_timeout_secs, 5);
        assert!(!config.supervisor.open_browser);
        assert_eq!(config.supervisor.restart_delay_ms, 500);
        // Untouched sections keep their defaults
        assert_eq!(config.control.grace_ms, 1000);
    }

    // Environment overrides are not exercised here: mutating the process
    // environment is unsafe under the parallel test runner.
}
