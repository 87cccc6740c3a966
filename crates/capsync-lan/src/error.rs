//! LAN fallback errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LanError {
    #[error("bind failed on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("serialisation error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
