//! Client error types.

use thiserror::Error;

/// Errors produced by the client engine.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("relay protocol error")]
    Protocol(#[from] capsync_protocol::ProtocolError),

    #[error("LAN fallback error")]
    Lan(#[from] capsync_lan::LanError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
