//! Exclusive role-claim arbitration.
//!
//! A tiny mutual-exclusion service over the locked role names. The
//! rule is first-valid-request-wins: no preemption, no priority, and
//! near-simultaneous claims are settled by whichever the server
//! processes first. Arbitration never fails; every request yields an
//! explicit grant or rejection.

use std::collections::{BTreeMap, HashMap};

use capsync_types::{RoleName, SenderId, LOCKED_ROLES};
use tracing::debug;

use crate::registry::ConnId;

/// Outcome of a claim request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted,
    Rejected,
}

impl ClaimOutcome {
    #[must_use]
    pub fn ok(self) -> bool {
        self == Self::Granted
    }
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    owner: SenderId,
    conn: ConnId,
}

/// The authoritative claim table for the locked roles.
///
/// Invariant: at most one claim exists per locked role at any time.
#[derive(Debug, Default)]
pub struct RoleTable {
    claims: HashMap<RoleName, Claim>,
}

impl RoleTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a claim from `sender` on `conn`.
    ///
    /// Granted when the role is unclaimed, or when the current owner
    /// re-claims it (idempotent; the claim is re-bound to the new
    /// connection, which covers reconnects). Unrestricted role names
    /// are granted without being recorded, since they need no
    /// arbitration.
    pub fn claim(&mut self, role: &RoleName, sender: SenderId, conn: ConnId) -> ClaimOutcome {
        if !role.is_locked() {
            return ClaimOutcome::Granted;
        }
        match self.claims.get(role) {
            Some(claim) if claim.owner != sender => ClaimOutcome::Rejected,
            _ => {
                self.claims.insert(role.clone(), Claim { owner: sender, conn });
                debug!(role = %role, owner = %sender, conn = %conn, "role claimed");
                ClaimOutcome::Granted
            }
        }
    }

    /// Voluntary release. Only honored when the current claim is
    /// bound to `conn`; anything else is a no-op. Returns whether the
    /// table changed.
    pub fn release(&mut self, role: &RoleName, conn: ConnId) -> bool {
        match self.claims.get(role) {
            Some(claim) if claim.conn == conn => {
                self.claims.remove(role);
                debug!(role = %role, conn = %conn, "role released");
                true
            }
            _ => false,
        }
    }

    /// Implicit release on disconnect: drop every claim bound to
    /// `conn`, returning the affected roles.
    pub fn release_conn(&mut self, conn: ConnId) -> Vec<RoleName> {
        let released: Vec<RoleName> = self
            .claims
            .iter()
            .filter(|(_, claim)| claim.conn == conn)
            .map(|(role, _)| role.clone())
            .collect();
        for role in &released {
            self.claims.remove(role);
            debug!(role = %role, conn = %conn, "role released by disconnect");
        }
        released
    }

    /// Current owner of a role, if any.
    #[must_use]
    pub fn owner(&self, role: &RoleName) -> Option<SenderId> {
        self.claims.get(role).map(|c| c.owner)
    }

    /// Full ownership snapshot. Always lists every locked role, with
    /// `None` for unclaimed ones.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<RoleName, Option<SenderId>> {
        LOCKED_ROLES
            .iter()
            .map(|&name| {
                let role = RoleName::from(name);
                let owner = self.owner(&role);
                (role, owner)
            })
            .collect()
    }
}
