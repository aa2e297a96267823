//! `ev-core` — foundational types for the evac rescue engine.
//!
//! This crate is a dependency of every other `ev-*` crate.  It intentionally
//! has no `ev-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                      |
//! |-----------|-----------------------------------------------|
//! | [`ids`]   | `VertexId`, `EdgeId`, `ResponderId`           |
//! | [`time`]  | `Tick`, tick/real-time conversion             |
//! | [`rng`]   | `SimRng` — the single seeded stochastic stream|
//! | [`phase`] | `Phase` (sweep → rescue, monotonic)           |
//! | [`error`] | `EvError`, `EvResult`                         |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                              |
//! |---------|-----------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types. |

pub mod error;
pub mod ids;
pub mod phase;
pub mod rng;
pub mod time;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{EvError, EvResult};
pub use ids::{EdgeId, ResponderId, VertexId};
pub use phase::Phase;
pub use rng::SimRng;
pub use time::{Tick, TICK_SECS};
