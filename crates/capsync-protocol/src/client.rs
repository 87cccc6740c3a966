//! Relay client connection: connect, authenticate, send, receive.

use std::time::Duration;

use capsync_types::envelope::AuthReply;
use capsync_types::Envelope;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::transport::EventTransport;
use crate::wire;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An established, authenticated connection to the relay.
#[derive(Debug)]
pub struct RelayConnection {
    ws: WsStream,
    client_count: usize,
}

impl RelayConnection {
    /// Connect to the relay and complete the handshake: optional
    /// shared-secret exchange, then the `connected` acknowledgment.
    ///
    /// A connect failure or timeout yields [`ProtocolError::Unreachable`];
    /// the caller decides whether to retry or fall back to LAN-only.
    /// There is no automatic reconnect loop.
    pub async fn connect(
        url: &str,
        password: Option<&str>,
        connect_timeout: Duration,
    ) -> Result<Self, ProtocolError> {
        let connect = connect_async(url);
        let (mut ws, _response) = tokio::time::timeout(connect_timeout, connect)
            .await
            .map_err(|_| ProtocolError::Unreachable(format!("timed out connecting to {url}")))?
            .map_err(|e| ProtocolError::Unreachable(e.to_string()))?;
        debug!(url, "websocket open, waiting for handshake");

        let client_count =
            tokio::time::timeout(connect_timeout, handshake(&mut ws, password))
                .await
                .map_err(|_| ProtocolError::Unreachable("handshake timed out".to_string()))??;

        Ok(Self { ws, client_count })
    }

    /// Connection count reported by the relay at handshake time.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.client_count
    }

    /// Split into independent send and receive halves.
    #[must_use]
    pub fn split(self) -> (RelaySender, RelayReceiver) {
        let (sink, stream) = self.ws.split();
        (RelaySender { sink }, RelayReceiver { stream })
    }
}

/// Drive the pre-session handshake on the unsplit stream. Returns the
/// connection count from the `connected` acknowledgment.
async fn handshake(ws: &mut WsStream, password: Option<&str>) -> Result<usize, ProtocolError> {
    loop {
        let frame = ws
            .next()
            .await
            .ok_or(ProtocolError::StreamClosed)?
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => return Err(ProtocolError::StreamClosed),
            // Ping replies are queued by tungstenite itself.
            _ => continue,
        };

        match wire::decode(&text)? {
            Envelope::AuthRequired => {
                let Some(password) = password else {
                    return Err(ProtocolError::AuthRejected);
                };
                let reply = serde_json::to_string(&AuthReply { password: password.to_string() })
                    .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
                ws.send(Message::Text(reply))
                    .await
                    .map_err(|e| ProtocolError::Connection(e.to_string()))?;
            }
            Envelope::AuthFailed => return Err(ProtocolError::AuthRejected),
            Envelope::Connected { clients } => return Ok(clients),
            other => {
                debug!(?other, "pre-handshake frame ignored");
            }
        }
    }
}

/// Sends envelopes to the relay.
pub struct RelaySender {
    sink: SplitSink<WsStream, Message>,
}

impl RelaySender {
    /// Send one envelope as a JSON text frame.
    pub async fn send(&mut self, msg: &Envelope) -> Result<(), ProtocolError> {
        let text = wire::encode(msg)?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))
    }

    /// Send a close frame and flush.
    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        self.sink
            .close()
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))
    }
}

#[async_trait::async_trait]
impl EventTransport for RelaySender {
    async fn send_event(&mut self, event: &Envelope) -> Result<(), ProtocolError> {
        self.send(event).await
    }
}

/// Receives envelopes from the relay.
pub struct RelayReceiver {
    stream: SplitStream<WsStream>,
}

impl RelayReceiver {
    /// Receive the next envelope.
    ///
    /// Returns `Ok(None)` when the relay has cleanly closed the
    /// connection. Malformed frames are dropped with a warning rather
    /// than surfaced as errors, so one buggy frame never takes the
    /// link down.
    pub async fn recv(&mut self) -> Result<Option<Envelope>, ProtocolError> {
        loop {
            let frame = match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(ProtocolError::Connection(e.to_string())),
            };

            match frame {
                Message::Text(text) => match wire::decode(&text) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) => {
                        warn!(error = %e, "dropping malformed frame from relay");
                    }
                },
                Message::Close(_) => return Ok(None),
                // Pings are answered by tungstenite; binary frames are
                // not part of this protocol.
                _ => {}
            }
        }
    }
}
