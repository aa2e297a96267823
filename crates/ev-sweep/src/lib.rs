//! `ev-sweep` — phase-one partition-and-cover exploration.
//!
//! The sweep splits the rooms-of-interest across responders with k-medoids
//! over corridor (BFS hop) distances, builds a per-cluster MST and walks it
//! with the classic DFS-doubling tour, then translates the tour into per-tick
//! actions: instruct capables, pick up incapables opportunistically, keep
//! moving.
//!
//! | Module          | Contents                                        |
//! |-----------------|-------------------------------------------------|
//! | [`cluster`]     | k-medoids over BFS hops, balance constraint     |
//! | [`tour`]        | complete graph → Prim MST → DFS 2× route        |
//! | [`coordinator`] | dispatch, segment repair, stall detection       |

pub mod cluster;
pub mod coordinator;
pub mod error;
pub mod tour;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use cluster::{partition_rooms, Clustering};
pub use coordinator::SweepCoordinator;
pub use error::{SweepError, SweepResult};
pub use tour::{plan_tour, Tour};
