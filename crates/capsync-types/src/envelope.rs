//! Wire message envelope.
//!
//! Every frame exchanged with the relay (and every LAN datagram) is a
//! UTF-8 JSON object with a `cmd` discriminator. The envelope is a
//! closed union: anything that does not parse into a known variant is
//! a malformed message and is dropped by the receiver.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::{AssetIndex, AssetState, BoardSide};
use crate::capper::CapperSlot;
use crate::role::RoleName;
use crate::sender::SenderId;

/// One wire message, tagged by `cmd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Envelope {
    /// Server -> client, once, when a shared secret is configured.
    AuthRequired,
    /// Server -> client just before closing a connection that failed
    /// the shared-secret check.
    AuthFailed,
    /// Handshake acknowledgment with the current connection count.
    Connected { clients: usize },
    /// Full role-ownership snapshot. Always lists every locked role;
    /// `None` means unclaimed.
    RoleStatus {
        roles: BTreeMap<RoleName, Option<SenderId>>,
    },
    /// A countdown of `seconds` has begun for the given capper slot.
    Start {
        seconds: f64,
        sender: SenderId,
        #[serde(default)]
        capper: CapperSlot,
    },
    /// Raw tri-state marker write.
    BoardUpdate {
        board: BoardSide,
        index: AssetIndex,
        state: AssetState,
        sender: SenderId,
    },
    /// Client -> server: request exclusive ownership of a role.
    RoleClaim { role: RoleName, sender: SenderId },
    /// Client -> server: voluntarily give up a role.
    RoleRelease { role: RoleName, sender: SenderId },
    /// Server -> requester only: outcome of a claim.
    RoleResult { role: RoleName, ok: bool },
}

impl Envelope {
    /// The originating client, for own-echo suppression and fan-out
    /// exclusion. `None` for server-originated messages.
    #[must_use]
    pub fn sender(&self) -> Option<&SenderId> {
        match self {
            Self::Start { sender, .. }
            | Self::BoardUpdate { sender, .. }
            | Self::RoleClaim { sender, .. }
            | Self::RoleRelease { sender, .. } => Some(sender),
            _ => None,
        }
    }

    /// Whether this is one of the two peer events the LAN fallback
    /// path carries (role arbitration does not exist there).
    #[must_use]
    pub fn is_lan_event(&self) -> bool {
        matches!(self, Self::Start { .. } | Self::BoardUpdate { .. })
    }
}

/// The bare client reply to `auth_required`. This is the one frame
/// without a `cmd` field, and it is only ever parsed during the
/// handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthReply {
    pub password: String,
}
