//! Client engine for capsync.
//!
//! Holds the per-client session state (boards, countdowns, roles),
//! applies remote events with own-echo suppression, and publishes
//! status snapshots for a front end to render. Network paths are
//! attached via [`link::establish`]: relay when configured, subnet
//! broadcast as fallback, local-only otherwise.

pub mod config;
pub mod engine;
pub mod error;
pub mod link;
pub mod reducer;

pub use config::{load_config, Config};
pub use engine::{ClientStatus, Engine, EngineEvent, LinkStatus};
pub use error::ClientError;
pub use reducer::{Applied, ClientState, Countdown};
