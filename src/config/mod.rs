use crate::models::AppConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "console.yaml";

/// Prefix of environment variables that override file settings
/// (`CONSOLE_BRIDGE__SERVER_URL`, `CONSOLE_LOGGING__DEBUG`, ...)
pub const ENV_PREFIX: &str = "CONSOLE";

/// Configuration manager for loading and saving the console configuration.
///
/// Settings are layered, later sources winning:
/// 1. Built-in defaults
/// 2. `console.yaml` in the config directory (optional)
/// 3. `CONSOLE_*` environment variables, `__` separating nested keys
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing `console.yaml`; created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the configuration from file and process environment.
    ///
    /// Logs nothing, so it can run before logging is set up; the caller
    /// reports a missing file via [`has_config_file`](Self::has_config_file).
    ///
    /// # Returns
    /// The merged AppConfig; defaults fill anything not set
    pub fn load(&self) -> Result<AppConfig> {
        self.load_with_env(None)
    }

    /// Load the configuration with `vars` standing in for the process environment.
    pub fn load_with_env(&self, vars: Option<config::Map<String, String>>) -> Result<AppConfig> {
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(vars);

        let layered = Config::builder()
            .add_source(File::new(self.config_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to read configuration: {}", self.config_path))?;

        layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration: {}", self.config_path))
    }

    /// Whether `console.yaml` exists in the config directory
    pub fn has_config_file(&self) -> bool {
        self.config_path.exists()
    }

    /// Save the configuration file.
    ///
    /// # Arguments
    /// * `config` - The AppConfig to save
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize configuration to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write configuration: {}", self.config_path))?;

        tracing::info!("Saved configuration to {}", self.config_path);
        Ok(())
    }

    /// Write a default configuration file unless one exists.
    ///
    /// # Returns
    /// `true` if a file was written
    pub fn write_default_if_missing(&self) -> Result<bool> {
        if self.has_config_file() {
            return Ok(false);
        }
        self.save(&AppConfig::default())?;
        Ok(true)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
