//! The two-phase controller state.

use std::fmt;

/// Controller phase.  Transitions exactly once, from `Sweep` to `Rescue`,
/// when the sweep completion predicate fires; never back.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Partition-and-cover exploration: visit every room, instruct capables.
    #[default]
    Sweep,
    /// Optimized carry-out of incapable occupants via rescue items.
    Rescue,
}

impl Phase {
    #[inline]
    pub fn is_sweep(self) -> bool {
        self == Phase::Sweep
    }

    #[inline]
    pub fn is_rescue(self) -> bool {
        self == Phase::Rescue
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Sweep => write!(f, "sweep"),
            Phase::Rescue => write!(f, "rescue"),
        }
    }
}
