//! WebSocket transport layer and wire protocol for capsync.
//!
//! This crate handles the relay connection (via tokio-tungstenite),
//! JSON frame encoding/decoding, the shared-secret handshake, and the
//! transport seam the client engine sends events through.

pub mod client;
pub mod error;
pub mod transport;
pub mod wire;

pub use client::{RelayConnection, RelayReceiver, RelaySender};
pub use error::ProtocolError;
pub use transport::EventTransport;
