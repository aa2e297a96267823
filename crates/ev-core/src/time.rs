//! Simulation time model.
//!
//! Time is a monotonically increasing `Tick` counter.  One tick represents a
//! fixed real-world duration of [`TICK_SECS`] seconds; all physics rates in
//! the kernel are expressed per second and scaled by it.  Using an integer
//! tick as the canonical time unit keeps all planner arithmetic exact and
//! comparisons O(1).

use std::fmt;

/// Real-world seconds represented by one simulation tick (τ in the physics).
pub const TICK_SECS: f64 = 1.0;

/// An absolute simulation tick counter.
///
/// Stored as `u64` so overflow is a non-concern at any conceivable run
/// length.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` steps after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0 + n)
    }

    /// Ticks elapsed from `earlier` to `self`.
    ///
    /// # Panics
    /// Panics in debug mode if `earlier > self`.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0 - earlier.0
    }

    /// Elapsed simulated minutes since tick 0.
    #[inline]
    pub fn minutes(self) -> f64 {
        self.0 as f64 * TICK_SECS / 60.0
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}
