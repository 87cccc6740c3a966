//! Relay server errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] capsync_protocol::ProtocolError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
