//! Local-subnet broadcast fallback for capsync.
//!
//! When no relay is configured, `start` and `board_update` events are
//! broadcast as raw JSON datagrams on the local subnet and picked up
//! by any listening peer. This path is strictly weaker than the
//! relay: no connections, no delivery confirmation, no role
//! arbitration, and datagrams may be silently lost.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use async_trait::async_trait;
use capsync_protocol::{EventTransport, ProtocolError};
use capsync_types::Envelope;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub mod error;

pub use error::LanError;

/// Receive buffer size; our datagrams are a few hundred bytes.
const RECV_BUF: usize = 2048;

/// One broadcast socket serving both directions of the LAN path.
#[derive(Clone)]
pub struct LanLink {
    socket: Arc<UdpSocket>,
    broadcast_to: SocketAddr,
}

impl LanLink {
    /// Bind the broadcast socket on `0.0.0.0:port` with address reuse,
    /// so several teammates on one machine can share the port.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(port: u16) -> Result<Self, LanError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|source| LanError::Bind { port, source })?;
        socket
            .set_reuse_address(true)
            .and_then(|()| socket.set_broadcast(true))
            .and_then(|()| socket.set_nonblocking(true))
            .map_err(|source| LanError::Bind { port, source })?;
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket
            .bind(&addr.into())
            .map_err(|source| LanError::Bind { port, source })?;

        let socket = UdpSocket::from_std(socket.into())?;
        let local_port = socket.local_addr()?.port();
        info!(port = local_port, "LAN fallback bound");
        Ok(Self {
            socket: Arc::new(socket),
            broadcast_to: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, local_port)),
        })
    }

    /// Port the socket actually bound (differs from the requested one
    /// only when binding port 0).
    pub fn local_port(&self) -> Result<u16, LanError> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Broadcast one event to the subnet. Best-effort: a send failure
    /// is logged and swallowed, matching the path's lossy contract.
    pub async fn send(&self, event: &Envelope) -> Result<(), LanError> {
        let payload =
            serde_json::to_vec(event).map_err(|e| LanError::Serialization(e.to_string()))?;
        if let Err(e) = self.socket.send_to(&payload, self.broadcast_to).await {
            warn!(error = %e, "LAN broadcast failed, event lost");
        }
        Ok(())
    }

    /// Spawn the receive loop, forwarding peer events into `tx`.
    ///
    /// Malformed or foreign datagrams are discarded without ever
    /// crashing the loop, and only `start`/`board_update` events are
    /// forwarded; role arbitration does not exist on this path. The
    /// loop ends when the consumer side of `tx` is dropped.
    pub fn spawn_listener(&self, tx: mpsc::Sender<Envelope>) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUF];
            loop {
                let (len, from) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(e) => {
                        warn!(error = %e, "LAN receive error");
                        continue;
                    }
                };
                let Ok(event) = serde_json::from_slice::<Envelope>(&buf[..len]) else {
                    debug!(%from, len, "discarding unrecognized datagram");
                    continue;
                };
                if !event.is_lan_event() {
                    debug!(%from, "discarding non-peer event from subnet");
                    continue;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        })
    }
}

#[async_trait]
impl EventTransport for LanLink {
    async fn send_event(&mut self, event: &Envelope) -> Result<(), ProtocolError> {
        self.send(event)
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))
    }
}
