//! Protocol and transport errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("relay unreachable: {0}")]
    Unreachable(String),

    #[error("relay rejected the shared secret")]
    AuthRejected,

    #[error("serialisation error: {0}")]
    Serialization(String),

    #[error("deserialisation error: {0}")]
    Deserialization(String),

    #[error("stream closed unexpectedly")]
    StreamClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
