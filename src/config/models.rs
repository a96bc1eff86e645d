use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

/// Worker HTTP server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Base directory for relative storage paths and the settings file.
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,
    /// Static dashboard assets.
    #[serde(default = "default_web_dir")]
    pub web_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            install_root: default_install_root(),
            web_dir: default_web_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// URL the supervisor opens in the browser.
    pub fn dashboard_url(&self) -> String {
        let ip = self.bind_addr.ip();
        let host = if ip.is_unspecified() || ip.is_loopback() {
            "localhost".to_string()
        } else if ip.is_ipv6() {
            format!("[{}]", ip)
        } else {
            ip.to_string()
        };
        format!("http://{}:{}", host, self.bind_addr.port())
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8050))
}

fn default_install_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_web_dir() -> PathBuf {
    PathBuf::from("web")
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024 // 100 MiB
}

/// Output storage layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    /// JSON file holding the category → directory mapping.
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,
    #[serde(default = "default_inputs_dir")]
    pub inputs_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            proxy_prefix: default_proxy_prefix(),
            inputs_dir: default_inputs_dir(),
        }
    }
}

fn default_settings_file() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_proxy_prefix() -> String {
    "outputs_proxy".to_string()
}

fn default_inputs_dir() -> PathBuf {
    PathBuf::from("inputs")
}

/// Remote backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub host_header: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            host_header: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.runninghub.cn".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Control endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    /// Delay between acknowledging a control request and shutting down.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Upper bound on the graceful drain once shutdown starts.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl ControlConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

fn default_grace_ms() -> u64 {
    1000
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

/// Supervisor loop
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    #[serde(default = "default_browser_delay_ms")]
    pub browser_delay_ms: u64,
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
    /// Consecutive unexpected exits tolerated before giving up.
    #[serde(default = "default_max_unexpected_restarts")]
    pub max_unexpected_restarts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Uptime after which a crash no longer counts as consecutive.
    #[serde(default = "default_healthy_uptime_secs")]
    pub healthy_uptime_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: default_restart_delay_ms(),
            browser_delay_ms: default_browser_delay_ms(),
            open_browser: default_open_browser(),
            max_unexpected_restarts: default_max_unexpected_restarts(),
            backoff_base_ms: default_backoff_base_ms(),
            healthy_uptime_secs: default_healthy_uptime_secs(),
        }
    }
}

fn default_restart_delay_ms() -> u64 {
    3000
}

fn default_browser_delay_ms() -> u64 {
    2000
}

fn default_open_browser() -> bool {
    true
}

fn default_max_unexpected_restarts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_healthy_uptime_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8050");
        assert_eq!(config.storage.proxy_prefix, "outputs_proxy");
        assert_eq!(config.remote.request_timeout_secs, 60);
        assert_eq!(config.control.grace(), Duration::from_secs(1));
        assert_eq!(config.supervisor.restart_delay_ms, 3000);
        assert_eq!(config.supervisor.max_unexpected_restarts, 3);
    }

    #[test]
    fn test_dashboard_url() {
        let mut server = ServerConfig::default();
        assert_eq!(server.dashboard_url(), "http://localhost:8050");

        server.bind_addr = "192.168.1.20:9000".parse().unwrap();
        assert_eq!(server.dashboard_url(), "http://192.168.1.20:9000");
    }
}
