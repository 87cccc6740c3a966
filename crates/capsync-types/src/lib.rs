//! Shared types for capsync.
//!
//! This crate contains all types shared across the capsync workspace:
//! sender identity, the wire message envelope, the tactical board model
//! with its effective-state derivation, role names, and capper slots.

pub mod board;
pub mod capper;
pub mod envelope;
pub mod role;
pub mod sender;

pub use board::{
    derive_effective, AssetIndex, AssetState, BoardSide, BoardState, ASSET_COUNT, ASSET_NAMES,
    GENERATOR_INDEX,
};
pub use capper::{CapperSlot, CAPPER_SLOT_COUNT, DEFAULT_TIMER_CYCLE};
pub use envelope::Envelope;
pub use role::{RoleName, LOCKED_ROLES};
pub use sender::SenderId;

/// Default UDP port for the local-subnet fallback path.
pub const DEFAULT_LAN_PORT: u16 = 54545;
