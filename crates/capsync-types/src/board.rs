//! Tactical board model and effective-state derivation.
//!
//! Each client keeps two boards (defense and offense) of four tri-state
//! asset markers. The raw markers are what travels over the wire; the
//! *effective* state shown to the user is derived from the raw markers
//! by [`derive_effective`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of assets per board.
pub const ASSET_COUNT: usize = 4;

/// Index of the generator asset, which other assets depend on.
pub const GENERATOR_INDEX: usize = 0;

/// Display names for the assets, in index order.
pub const ASSET_NAMES: [&str; ASSET_COUNT] = ["Generator", "Turret 1", "Turret 2", "Radar"];

/// Which of the two boards a marker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardSide {
    Defense,
    Offense,
}

impl BoardSide {
    /// Both sides, for iteration.
    pub const ALL: [Self; 2] = [Self::Defense, Self::Offense];
}

impl std::fmt::Display for BoardSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defense => write!(f, "defense"),
            Self::Offense => write!(f, "offense"),
        }
    }
}

/// Raw tri-state marker for one asset.
///
/// On the wire this is the integer 0, 1 or 2; any other value fails
/// deserialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AssetState {
    /// Asset is up (0).
    #[default]
    Normal,
    /// Asset is contested / work in progress (1).
    Contested,
    /// Asset is destroyed or secured (2).
    Destroyed,
}

/// Rejected value for a field with a closed integer domain.
#[derive(Debug, Error)]
#[error("value {0} out of range for {1}")]
pub struct OutOfRange(pub u8, pub &'static str);

impl TryFrom<u8> for AssetState {
    type Error = OutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Contested),
            2 => Ok(Self::Destroyed),
            other => Err(OutOfRange(other, "asset state")),
        }
    }
}

impl From<AssetState> for u8 {
    fn from(state: AssetState) -> Self {
        match state {
            AssetState::Normal => 0,
            AssetState::Contested => 1,
            AssetState::Destroyed => 2,
        }
    }
}

/// Validated asset index in `0..ASSET_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AssetIndex(u8);

impl AssetIndex {
    /// The generator slot.
    pub const GENERATOR: Self = Self(0);

    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    /// All valid indices, in order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..ASSET_COUNT as u8).map(Self)
    }
}

impl TryFrom<u8> for AssetIndex {
    type Error = OutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if usize::from(value) < ASSET_COUNT {
            Ok(Self(value))
        } else {
            Err(OutOfRange(value, "asset index"))
        }
    }
}

impl From<AssetIndex> for u8 {
    fn from(index: AssetIndex) -> Self {
        index.0
    }
}

impl std::fmt::Display for AssetIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw markers for both boards. Initialized to all-normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardState {
    defense: [AssetState; ASSET_COUNT],
    offense: [AssetState; ASSET_COUNT],
}

impl BoardState {
    /// Raw markers for one side.
    #[must_use]
    pub fn side(&self, side: BoardSide) -> &[AssetState; ASSET_COUNT] {
        match side {
            BoardSide::Defense => &self.defense,
            BoardSide::Offense => &self.offense,
        }
    }

    #[must_use]
    pub fn get(&self, side: BoardSide, index: AssetIndex) -> AssetState {
        self.side(side)[index.as_usize()]
    }

    /// Write one raw marker. Last write wins: there is no version or
    /// timestamp check, so a delayed remote update can overwrite a
    /// newer local one.
    pub fn set(&mut self, side: BoardSide, index: AssetIndex, state: AssetState) {
        let board = match side {
            BoardSide::Defense => &mut self.defense,
            BoardSide::Offense => &mut self.offense,
        };
        board[index.as_usize()] = state;
    }
}

/// Derive the display-facing state of one board from its raw markers.
///
/// Pure function, recomputed from scratch on every mutation:
/// 1. `Contested` markers collapse to `Normal` for display.
/// 2. If the generator (index 0) is `Destroyed`, every other asset
///    displays as `Contested` regardless of its own raw state; the
///    generator itself keeps `Destroyed`.
#[must_use]
pub fn derive_effective(raw: &[AssetState; ASSET_COUNT]) -> [AssetState; ASSET_COUNT] {
    let generator_down = raw[GENERATOR_INDEX] == AssetState::Destroyed;
    let mut effective = [AssetState::Normal; ASSET_COUNT];
    for (i, &state) in raw.iter().enumerate() {
        effective[i] = if i != GENERATOR_INDEX && generator_down {
            AssetState::Contested
        } else if state == AssetState::Contested {
            AssetState::Normal
        } else {
            state
        };
    }
    effective
}
