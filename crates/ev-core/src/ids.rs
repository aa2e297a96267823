//! Dense arena index types.
//!
//! The graph, the responder table, and every planner structure key their
//! flat storage by these ids: a `u32` slot number, nothing more.  The top
//! slot (`u32::MAX`) is reserved as the [`NONE`](VertexId::NONE) marker so
//! parent and next-hop tables can stay plain `Vec`s instead of
//! `Vec<Option<_>>`.  Check with [`is_valid`](VertexId::is_valid) before
//! indexing anything read out of such a table.
//!
//! The inner integer is `pub` for literal construction in tests and tight
//! loops; prefer [`from_index`](VertexId::from_index)/[`index`](VertexId::index)
//! at arena boundaries.

use std::fmt;

/// Declare arena id types, each with a short log prefix.
macro_rules! arena_ids {
    ($($(#[$attr:meta])* $name:ident => $prefix:literal),+ $(,)?) => {$(
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u32);

        impl $name {
            /// The reserved "no slot" marker.
            pub const NONE: Self = Self(u32::MAX);

            /// Wrap an arena offset.
            ///
            /// # Panics
            /// Debug-asserts that `i` fits below the reserved top slot.
            #[inline]
            pub fn from_index(i: usize) -> Self {
                debug_assert!(i < u32::MAX as usize, "arena offset overflow");
                Self(i as u32)
            }

            /// The arena offset this id names.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// `false` for the [`NONE`](Self::NONE) marker.
            #[inline]
            pub fn is_valid(self) -> bool {
                self != Self::NONE
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, concat!($prefix, "{}"), self.0)
                } else {
                    f.write_str(concat!($prefix, "-"))
                }
            }
        }
    )+};
}

arena_ids! {
    /// A vertex slot (room, hallway, exit, …) in the building arena.
    VertexId => "v",
    /// An undirected edge slot in the building arena.
    EdgeId => "e",
    /// A firefighter responder slot.
    ResponderId => "ff",
}
