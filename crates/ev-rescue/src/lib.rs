//! `ev-rescue` — phase-two optimized carry-out.
//!
//! Once the sweep has discovered who needs carrying, this crate turns the
//! observed demand into **rescue items** (bounded room subsets with an
//! entry/exit pair and a concrete path), selects a non-overlapping set by
//! value density, and executes the chosen items tick by tick — re-planning
//! whenever burned edges invalidate a path.
//!
//! | Module        | Contents                                             |
//! |---------------|------------------------------------------------------|
//! | [`item`]      | `RescueItem`, `ItemExecutionPlan`, truncation        |
//! | [`optimizer`] | Generation, pruning, `GreedySelector` / `LpSelector` |
//! | [`tactical`]  | Per-responder queues, dispatch, the replan hook      |
//! | [`error`]     | `RescueError`, `RescueResult`                        |
//!
//! # Cargo features
//!
//! | Feature | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `lp`    | Builds `LpSelector` (LP relaxation + greedy rounding).     |

pub mod error;
pub mod item;
pub mod optimizer;
pub mod tactical;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{RescueError, RescueResult};
pub use item::{ItemExecutionPlan, RescueItem};
pub use optimizer::{GreedySelector, ItemSelector, Optimizer, SelectorStart};
pub use tactical::TacticalCoordinator;

#[cfg(feature = "lp")]
pub use optimizer::LpSelector;
