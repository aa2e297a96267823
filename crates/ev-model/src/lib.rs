//! `ev-model` — the two-phase responder controller.
//!
//! One call per tick: [`RescueModel::decide`] takes the kernel's fog-of-war
//! snapshot and returns the actions for every responder.
//!
//! ```text
//! ┌─────────┐  sweep complete   ┌──────────────────────────────┐
//! │  SWEEP  │ ────────────────► │            RESCUE            │
//! │ explore │   (one-time,      │ optimizer once on a snapshot │
//! │ instruct│    monotonic)     │ + tactical execution         │
//! └─────────┘                   │ + replan on burned edges     │
//!                               └──────────────────────────────┘
//! ```
//!
//! The model holds all planner state (tours, item queues, the last seen
//! edge set); the kernel holds all world state.  `decide` never mutates the
//! snapshot it is given.
//!
//! # Cargo features
//!
//! | Feature | Effect                                                  |
//! |---------|---------------------------------------------------------|
//! | `lp`    | Makes `use_lp: true` select the LP item selector.       |

pub mod model;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use model::{ModelConfig, RescueModel};
