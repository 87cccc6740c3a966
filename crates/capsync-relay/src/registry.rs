//! Connection registry and broadcast fan-out.
//!
//! Each connection owns a bounded outbound queue; the registry only
//! ever `try_send`s into it, so one slow or dead consumer can never
//! stall delivery to the rest.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Identifier for one live connection, unique for the lifetime of the
/// relay process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The set of connected clients and their outbound queues.
#[derive(Debug, Default)]
pub struct Registry {
    next_id: u64,
    clients: HashMap<ConnId, mpsc::Sender<String>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's outbound queue.
    pub fn insert(&mut self, tx: mpsc::Sender<String>) -> ConnId {
        self.next_id += 1;
        let id = ConnId(self.next_id);
        self.clients.insert(id, tx);
        id
    }

    /// Remove a connection. Returns whether it was present.
    pub fn remove(&mut self, id: ConnId) -> bool {
        self.clients.remove(&id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Queue a frame for one connection. Returns `false` if the
    /// connection turned out to be dead (it is removed).
    pub fn send_to(&mut self, id: ConnId, text: &str) -> bool {
        let Some(tx) = self.clients.get(&id) else {
            return false;
        };
        match tx.try_send(text.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                // Slow consumer: drop the frame, keep the connection.
                warn!(conn = %id, "outbound queue full, dropping frame");
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn = %id, "outbound queue closed, removing connection");
                self.clients.remove(&id);
                false
            }
        }
    }

    /// Deliver a frame to every connection except `origin`.
    ///
    /// Dead connections encountered along the way are removed and
    /// returned so the caller can release whatever they owned;
    /// delivery to the remaining connections is unaffected.
    pub fn broadcast_except(&mut self, origin: Option<ConnId>, text: &str) -> Vec<ConnId> {
        let mut dead = Vec::new();
        for (&id, tx) in &self.clients {
            if Some(id) == origin {
                continue;
            }
            match tx.try_send(text.to_string()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(conn = %id, "outbound queue full, dropping frame");
                }
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }
        for &id in &dead {
            self.clients.remove(&id);
        }
        dead
    }
}
