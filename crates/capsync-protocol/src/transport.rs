//! Transport seam between the client engine and its event paths.

use async_trait::async_trait;
use capsync_types::Envelope;

use crate::error::ProtocolError;

/// Something that can carry an outbound event to the rest of the team.
///
/// Implemented by the relay connection and by the LAN broadcast
/// fallback, so the engine does not care which path is active.
#[async_trait]
pub trait EventTransport: Send + 'static {
    /// Send one event. Best-effort on the LAN path; on the relay path
    /// a failure means the link is gone.
    async fn send_event(&mut self, event: &Envelope) -> Result<(), ProtocolError>;
}
