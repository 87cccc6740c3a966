//! Role names and the locked-role set.

use serde::{Deserialize, Serialize};

use crate::capper::CapperSlot;

/// Role names for which the relay enforces single-ownership. Any
/// other role name is unrestricted: clients may adopt it locally
/// without contacting the relay.
pub const LOCKED_ROLES: [&str; 2] = ["capper1", "capper2"];

/// A role a player can take within the team.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The locked role for a capper slot.
    #[must_use]
    pub fn capper(slot: CapperSlot) -> Self {
        match slot {
            CapperSlot::One => Self::new(LOCKED_ROLES[0]),
            CapperSlot::Two => Self::new(LOCKED_ROLES[1]),
        }
    }

    /// Whether this role is subject to relay arbitration.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        LOCKED_ROLES.contains(&self.0.as_str())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capper_roles_are_locked() {
        assert!(RoleName::capper(CapperSlot::One).is_locked());
        assert!(RoleName::capper(CapperSlot::Two).is_locked());
    }

    #[test]
    fn other_roles_are_unrestricted() {
        assert!(!RoleName::new("chaser").is_locked());
        assert!(!RoleName::new("Capper 1").is_locked());
    }

    #[test]
    fn serializes_as_bare_string() {
        let role = RoleName::capper(CapperSlot::One);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"capper1\"");
    }
}
