//! Client configuration loaded from TOML.

use std::path::PathBuf;
use std::time::Duration;

use capsync_types::{DEFAULT_LAN_PORT, DEFAULT_TIMER_CYCLE};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub relay: RelayClientConfig,
    #[serde(default)]
    pub lan: LanConfig,
    #[serde(default)]
    pub timers: TimerConfig,
}

/// Player identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
        }
    }
}

/// Relay connection settings. When `url` is unset the client never
/// tries the relay and goes straight to the LAN fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayClientConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl RelayClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Local-subnet fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lan_port")]
    pub port: u16,
}

impl Default for LanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_lan_port(),
        }
    }
}

/// Countdown timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Durations (seconds) the start hotkey cycles through, in order.
    #[serde(default = "default_cycle")]
    pub cycle: Vec<f64>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            cycle: default_cycle(),
        }
    }
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "capsync".to_string())
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_lan_port() -> u16 {
    DEFAULT_LAN_PORT
}

fn default_cycle() -> Vec<f64> {
    DEFAULT_TIMER_CYCLE.to_vec()
}

/// Default config file location: `<config dir>/capsync/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("capsync").join("config.toml"))
}

/// Load configuration from `path`, or from the default location. A
/// missing file yields the default configuration; a file that exists
/// but does not parse is an error.
pub fn load_config(path: Option<&PathBuf>) -> Result<Config, ClientError> {
    let path = match path {
        Some(path) => path.clone(),
        None => match default_config_path() {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(&path)
        .map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&text)
        .map_err(|e| ClientError::Config(format!("cannot parse {}: {e}", path.display())))
}
