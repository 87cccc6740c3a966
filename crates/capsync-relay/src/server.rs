//! Relay accept loop and per-connection handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use capsync_protocol::wire;
use capsync_types::Envelope;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::registry::{ConnId, Registry};
use crate::roles::RoleTable;

/// Shared mutable state: the connection registry and the role-claim
/// table live behind one lock, so every mutation is serialized.
#[derive(Default)]
struct RelayState {
    registry: Registry,
    roles: RoleTable,
}

impl RelayState {
    /// Broadcast to everyone but `origin`, then keep releasing roles
    /// held by connections that turned out dead (each release
    /// triggers a fresh status broadcast of its own).
    fn broadcast_and_reap(&mut self, origin: Option<ConnId>, text: &str) {
        let mut dead = self.registry.broadcast_except(origin, text);
        while !dead.is_empty() {
            let mut released = false;
            for conn in dead.drain(..) {
                released |= !self.roles.release_conn(conn).is_empty();
            }
            if released {
                let status = role_status_frame(&self.roles);
                dead = self.registry.broadcast_except(None, &status);
            }
        }
    }

    /// Broadcast the current role snapshot to every connection.
    fn broadcast_role_status(&mut self) {
        let status = role_status_frame(&self.roles);
        self.broadcast_and_reap(None, &status);
    }
}

fn role_status_frame(roles: &RoleTable) -> String {
    let msg = Envelope::RoleStatus { roles: roles.snapshot() };
    // A role-status snapshot always serializes: string keys, uuid values.
    wire::encode(&msg).unwrap_or_else(|_| String::from(r#"{"cmd":"role_status","roles":{}}"#))
}

/// The capsync relay server.
pub struct RelayServer {
    listener: TcpListener,
    config: Arc<RelayConfig>,
    state: Arc<Mutex<RelayState>>,
}

impl RelayServer {
    /// Bind the listener. Port 0 picks an ephemeral port (used by
    /// tests); see [`local_addr`](Self::local_addr).
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let addr = format!("{}:{}", config.bind, config.port);
        let listener = TcpListener::bind(&addr).await.map_err(RelayError::Bind)?;
        info!(addr = %listener.local_addr()?, password = config.password.is_some(), "relay listening");
        Ok(Self {
            listener,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(RelayState::default())),
        })
    }

    /// The address the relay is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever. Each connection runs in its own
    /// task; a fault in one never reaches the others.
    pub async fn run(self) -> Result<(), RelayError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let config = Arc::clone(&self.config);
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, config, state).await {
                    debug!(%addr, error = %e, "connection ended with error");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: Arc<RelayConfig>,
    state: Arc<Mutex<RelayState>>,
) -> Result<(), RelayError> {
    let mut ws = accept_async(stream).await?;
    debug!(%addr, "client connected");

    if let Some(password) = &config.password {
        if !auth_gate(&mut ws, password, config.auth_timeout()).await? {
            info!(%addr, "authentication failed, closing");
            let _ = ws.send(Message::Text(wire::encode(&Envelope::AuthFailed)?)).await;
            let _ = ws.close(None).await;
            return Ok(());
        }
    }

    // Register, then greet with the connection count and the current
    // role snapshot before the outbound queue starts draining.
    let (queue_tx, mut queue_rx) = mpsc::channel::<String>(config.send_queue);
    let (conn_id, clients, status) = {
        let mut state = state.lock().await;
        let conn_id = state.registry.insert(queue_tx);
        (conn_id, state.registry.len(), role_status_frame(&state.roles))
    };
    info!(%addr, conn = %conn_id, clients, "client registered");

    let greeting = wire::encode(&Envelope::Connected { clients })?;
    ws.send(Message::Text(greeting)).await?;
    ws.send(Message::Text(status)).await?;

    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut heartbeat = tokio::time::interval(config.heartbeat_interval());
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut awaiting_pong: Option<Instant> = None;

    loop {
        // The deadline arm is disabled until a ping is in flight.
        let pong_deadline = awaiting_pong
            .map_or_else(Instant::now, |sent| sent + config.heartbeat_timeout());
        tokio::select! {
            // Drain the outbound queue into the socket.
            frame = queue_rx.recv() => {
                match frame {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            // Server-initiated keepalive.
            _ = heartbeat.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                awaiting_pong.get_or_insert_with(Instant::now);
            }
            // An unanswered ping tears the connection down at the
            // configured timeout, not at the next tick.
            () = tokio::time::sleep_until(pong_deadline), if awaiting_pong.is_some() => {
                warn!(conn = %conn_id, "heartbeat timed out");
                break;
            }
            // Inbound frames from this client.
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(conn_id, &text, &state).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = None;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(conn = %conn_id, error = %e, "read error");
                        break;
                    }
                }
            }
        }
    }

    // Registry cleanup and implicit role release; one status broadcast
    // covers every role this disconnect freed.
    {
        let mut state = state.lock().await;
        state.registry.remove(conn_id);
        let released = state.roles.release_conn(conn_id);
        info!(conn = %conn_id, clients = state.registry.len(), "client disconnected");
        if !released.is_empty() {
            state.broadcast_role_status();
        }
    }
    Ok(())
}

/// Run the shared-secret exchange. Returns whether the client passed.
/// Any malformed reply or timeout counts as a failure.
async fn auth_gate(
    ws: &mut WebSocketStream<TcpStream>,
    password: &str,
    timeout: Duration,
) -> Result<bool, RelayError> {
    ws.send(Message::Text(wire::encode(&Envelope::AuthRequired)?)).await?;

    let reply = tokio::time::timeout(timeout, ws.next()).await;
    let Ok(Some(Ok(Message::Text(text)))) = reply else {
        return Ok(false);
    };
    match wire::decode_auth_reply(&text) {
        Ok(reply) => Ok(reply.password == password),
        Err(e) => {
            debug!(error = %e, "malformed auth reply");
            Ok(false)
        }
    }
}

/// Process one inbound frame. Malformed or unexpected frames are
/// dropped and logged; the connection stays open.
async fn handle_frame(conn_id: ConnId, text: &str, state: &Arc<Mutex<RelayState>>) {
    let msg = match wire::decode(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(conn = %conn_id, error = %e, "dropping malformed frame");
            return;
        }
    };

    match msg {
        // Peer events are forwarded untouched to everyone else; the
        // relay does not interpret their payloads.
        msg @ (Envelope::Start { .. } | Envelope::BoardUpdate { .. }) => {
            let Ok(frame) = wire::encode(&msg) else { return };
            let mut state = state.lock().await;
            state.broadcast_and_reap(Some(conn_id), &frame);
            debug!(conn = %conn_id, clients = state.registry.len(), "event fanned out");
        }
        Envelope::RoleClaim { role, sender } => {
            let mut state = state.lock().await;
            let outcome = state.roles.claim(&role, sender, conn_id);
            let result = Envelope::RoleResult { role, ok: outcome.ok() };
            if let Ok(frame) = wire::encode(&result) {
                state.registry.send_to(conn_id, &frame);
            }
            if outcome.ok() {
                state.broadcast_role_status();
            }
        }
        Envelope::RoleRelease { role, .. } => {
            let mut state = state.lock().await;
            if state.roles.release(&role, conn_id) {
                state.broadcast_role_status();
            }
        }
        other => {
            warn!(conn = %conn_id, ?other, "unexpected server-bound frame dropped");
        }
    }
}
