//! Network path selection: relay first, then LAN fallback.

use capsync_lan::LanLink;
use capsync_protocol::RelayConnection;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{Engine, EngineEvent, LinkStatus};
use crate::error::ClientError;

/// Attach the best available network path to `engine`.
///
/// Tries the configured relay first. If no relay is configured or the
/// connect fails, falls back to subnet broadcast when enabled, and to
/// no network at all otherwise. Local actions work on every path.
///
/// An authentication rejection is surfaced as an error rather than
/// falling back: a wrong password is an operator problem, not a
/// network one.
pub async fn establish(engine: &mut Engine, config: &Config) -> Result<LinkStatus, ClientError> {
    if let Some(url) = &config.relay.url {
        match RelayConnection::connect(
            url,
            config.relay.password.as_deref(),
            config.relay.connect_timeout(),
        )
        .await
        {
            Ok(conn) => {
                let clients = conn.client_count();
                info!(url, clients, "connected to relay");
                let (sender, mut receiver) = conn.split();
                engine.attach_relay(Box::new(sender), clients);

                let events = engine.event_sender();
                tokio::spawn(async move {
                    loop {
                        match receiver.recv().await {
                            Ok(Some(msg)) => {
                                if events.send(EngineEvent::Remote(msg)).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {
                                let _ = events.send(EngineEvent::RelayClosed).await;
                                break;
                            }
                            Err(e) => {
                                warn!(error = %e, "relay receive failed");
                                let _ = events.send(EngineEvent::RelayClosed).await;
                                break;
                            }
                        }
                    }
                });
                return Ok(LinkStatus::Relay);
            }
            Err(e @ capsync_protocol::ProtocolError::AuthRejected) => {
                return Err(ClientError::Protocol(e));
            }
            Err(e) => {
                warn!(url, error = %e, "relay unreachable, falling back");
            }
        }
    }

    if config.lan.enabled {
        let link = LanLink::bind(config.lan.port)?;
        let (tx, mut rx) = tokio::sync::mpsc::channel(256);
        link.spawn_listener(tx);

        let events = engine.event_sender();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if events.send(EngineEvent::Remote(msg)).await.is_err() {
                    break;
                }
            }
        });

        engine.attach_lan(Box::new(link));
        info!(port = config.lan.port, "using LAN broadcast fallback");
        return Ok(LinkStatus::LanOnly);
    }

    info!("no network path configured, running locally");
    Ok(LinkStatus::Local)
}
