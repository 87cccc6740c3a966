//! Relay server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Network and keepalive settings for the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret; when set, every connection must authenticate
    /// before anything else is processed.
    #[serde(default)]
    pub password: Option<String>,
    /// How often the server pings each connection.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// How long an unanswered ping is tolerated before the connection
    /// is torn down.
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// How long a gated connection gets to supply the shared secret.
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    /// Bound of each connection's outbound queue; a slow consumer
    /// loses messages instead of stalling the fan-out.
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            password: None,
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            auth_timeout_secs: default_auth_timeout_secs(),
            send_queue: default_send_queue(),
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    #[must_use]
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    #[must_use]
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_heartbeat_interval_secs() -> u64 {
    20
}

fn default_heartbeat_timeout_secs() -> u64 {
    10
}

fn default_auth_timeout_secs() -> u64 {
    10
}

fn default_send_queue() -> usize {
    64
}
