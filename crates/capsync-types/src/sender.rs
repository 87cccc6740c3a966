//! Sender identity types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one running client instance.
///
/// Generated once per process and attached to every event a client
/// originates, so that receivers can discard their own echoes and the
/// relay can attribute role claims. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SenderId(Uuid);

impl SenderId {
    /// Generate a new random sender ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a sender ID from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SenderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
