use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration loaded from `console.yaml` and the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bridge: BridgeSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// How the data bridge is chosen at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeModeSetting {
    /// Probe the server once and pick Live or Stub from the result
    #[default]
    Auto,
    Live,
    Stub,
}

/// Settings for the data bridge, worker pool and debounce windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default)]
    pub mode: BridgeModeSetting,

    /// Per-request timeout applied by the HTTP client
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Deadline for a whole bridge call, including time queued for a worker
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,

    /// Consecutive failures that move a Live bridge to Degraded
    #[serde(default = "default_threshold")]
    pub degraded_after_failures: u32,

    /// Further consecutive failures that move a Degraded bridge to Unavailable
    #[serde(default = "default_threshold")]
    pub unavailable_after_failures: u32,

    #[serde(default = "default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,

    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Endpoint overrides keyed by operation name (e.g. `get_clients`)
    #[serde(default)]
    pub endpoints: IndexMap<String, String>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            mode: BridgeModeSetting::Auto,
            request_timeout_ms: default_request_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            worker_threads: default_worker_threads(),
            max_concurrent_calls: default_max_concurrent_calls(),
            max_queue_depth: default_max_queue_depth(),
            degraded_after_failures: default_threshold(),
            unavailable_after_failures: default_threshold(),
            refresh_debounce_ms: default_refresh_debounce_ms(),
            search_debounce_ms: default_search_debounce_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
            endpoints: IndexMap::new(),
        }
    }
}

impl BridgeSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn refresh_debounce(&self) -> Duration {
        Duration::from_millis(self.refresh_debounce_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_directory")]
    pub directory: String,

    #[serde(default = "default_log_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_true")]
    pub console: bool,

    /// Write the log file as JSON lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            prefix: default_log_prefix(),
            debug: false,
            console: true,
            json: false,
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_call_timeout_ms() -> u64 {
    8_000
}

fn default_probe_timeout_ms() -> u64 {
    1_500
}

fn default_worker_threads() -> usize {
    4
}

fn default_max_concurrent_calls() -> usize {
    4
}

fn default_max_queue_depth() -> usize {
    64
}

fn default_threshold() -> u32 {
    1
}

fn default_refresh_debounce_ms() -> u64 {
    500
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "server-console".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_settings_defaults() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.mode, BridgeModeSetting::Auto);
        assert_eq!(settings.call_timeout(), Duration::from_secs(8));
        assert_eq!(settings.degraded_after_failures, 1);
        assert_eq!(settings.unavailable_after_failures, 1);
        assert!(settings.endpoints.is_empty());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "bridge:\n  server_url: http://backup.local:9000\n  mode: stub\n";
        let config: AppConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(config.bridge.server_url, "http://backup.local:9000");
        assert_eq!(config.bridge.mode, BridgeModeSetting::Stub);
        assert_eq!(config.bridge.max_queue_depth, 64);
        assert_eq!(config.logging, LoggingSettings::default());
    }

    #[test]
    fn test_refresh_interval_never_zero() {
        let settings = BridgeSettings {
            refresh_interval_secs: 0,
            ..BridgeSettings::default()
        };
        assert_eq!(settings.refresh_interval(), Duration::from_secs(1));
    }
}
