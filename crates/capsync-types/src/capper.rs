//! Capper slot identifiers and timer defaults.

use serde::{Deserialize, Serialize};

use crate::board::OutOfRange;

/// Number of capper slots.
pub const CAPPER_SLOT_COUNT: usize = 2;

/// Durations (seconds) the hotkey cycles through, in order.
pub const DEFAULT_TIMER_CYCLE: [f64; 3] = [35.0, 25.0, 20.0];

/// Which capper a countdown belongs to. Wire values are 1 and 2; a
/// missing `capper` field deserializes to slot one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CapperSlot {
    #[default]
    One,
    Two,
}

impl CapperSlot {
    /// Both slots, for iteration.
    pub const ALL: [Self; CAPPER_SLOT_COUNT] = [Self::One, Self::Two];

    /// Zero-based index for array storage.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

impl TryFrom<u8> for CapperSlot {
    type Error = OutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(OutOfRange(other, "capper slot")),
        }
    }
}

impl From<CapperSlot> for u8 {
    fn from(slot: CapperSlot) -> Self {
        match slot {
            CapperSlot::One => 1,
            CapperSlot::Two => 2,
        }
    }
}

impl std::fmt::Display for CapperSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_one_based() {
        assert_eq!(serde_json::to_string(&CapperSlot::One).unwrap(), "1");
        assert_eq!(serde_json::to_string(&CapperSlot::Two).unwrap(), "2");
        assert_eq!(serde_json::from_str::<CapperSlot>("2").unwrap(), CapperSlot::Two);
    }

    #[test]
    fn zero_is_rejected() {
        assert!(serde_json::from_str::<CapperSlot>("0").is_err());
        assert!(serde_json::from_str::<CapperSlot>("3").is_err());
    }

    #[test]
    fn default_is_slot_one() {
        assert_eq!(CapperSlot::default(), CapperSlot::One);
    }
}
