//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/devsync/config.toml)
//! 3. Environment variables (DEVSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::ReconnectPolicy;

/// Environment variable prefix
const ENV_PREFIX: &str = "DEVSYNC";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket base URL of the session fanout endpoint (ws:// or wss://)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Base URL of the REST API used for the session list
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Directory for stored credentials
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Credential key holding the bearer token
    #[serde(default = "default_token_key")]
    pub token_key: String,

    /// Credential key holding this device's id
    #[serde(default = "default_device_id_key")]
    pub device_id_key: String,

    /// Delay before the first reconnect, doubled on each further attempt
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Reconnect attempts before giving up
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Log file (stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_url: default_api_url(),
            data_dir: default_data_dir(),
            token_key: default_token_key(),
            device_id_key: default_device_id_key(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DEVSYNC_SERVER_URL, DEVSYNC_API_URL, ...)
    /// 2. Config file (~/.config/devsync/config.toml or DEVSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.server_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.api_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Unparseable numbers keep the file value
        if let Ok(val) = std::env::var(format!("{}_RECONNECT_BASE_DELAY_MS", ENV_PREFIX)) {
            if let Ok(ms) = val.parse() {
                self.reconnect_base_delay_ms = ms;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_RECONNECT_MAX_ATTEMPTS", ENV_PREFIX)) {
            if let Ok(attempts) = val.parse() {
                self.reconnect_max_attempts = attempts;
            }
        }
    }

    /// Reject values the sync client cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            bail!(
                "server_url must start with ws:// or wss://, got '{}'",
                self.server_url
            );
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            bail!(
                "api_url must start with http:// or https://, got '{}'",
                self.api_url
            );
        }
        if self.token_key.is_empty() || self.device_id_key.is_empty() {
            bail!("token_key and device_id_key must not be empty");
        }
        if self.token_key == self.device_id_key {
            bail!("token_key and device_id_key must differ");
        }
        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with DEVSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("devsync")
            .join("config.toml")
    }

    /// Get the path to the stored credentials
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    /// Build the fanout endpoint URL for a bearer token
    pub fn websocket_url(&self, token: &str) -> String {
        format!(
            "{}/ws?token={}",
            self.server_url.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }

    /// Reconnect policy described by this configuration
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_base_delay_ms),
            self.reconnect_max_attempts,
        )
    }
}

fn default_server_url() -> String {
    "wss://localhost:8443".to_string()
}

fn default_api_url() -> String {
    "https://localhost:8443/api".to_string()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devsync")
}

fn default_token_key() -> String {
    "access_token".to_string()
}

fn default_device_id_key() -> String {
    "device_id".to_string()
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_attempts() -> u32 {
    5
}
