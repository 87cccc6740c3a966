//! Relay server for capsync.
//!
//! The relay mediates between clients that cannot reach each other
//! directly: it fans events out to every other connected client,
//! optionally gates connections behind a shared secret, and owns the
//! authoritative role-claim table for the locked roles.

pub mod config;
pub mod error;
pub mod registry;
pub mod roles;
pub mod server;

pub use config::RelayConfig;
pub use error::RelayError;
pub use registry::{ConnId, Registry};
pub use roles::{ClaimOutcome, RoleTable};
pub use server::RelayServer;
