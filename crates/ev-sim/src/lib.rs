//! `ev-sim` — the discrete-tick simulation kernel.
//!
//! Owns the building graph, the ground-truth occupant tables, the fire and
//! smoke fields, and the single seeded stochastic stream.  Drivers interact
//! through exactly three calls:
//!
//! ```rust,ignore
//! let mut sim = SimulationBuilder::new(&config, 2, seed).build()?;
//! loop {
//!     let state = sim.read();            // fog-of-war snapshot
//!     let actions = model.decide(&state); // external planner
//!     let result = sim.update(&actions);  // one atomic tick
//!     if sim.stats().remaining == 0 { break; }
//! }
//! ```
//!
//! # Determinism
//!
//! Identical (config, seed, action trace) triples produce bit-identical
//! `TickResult` sequences: all stochastic draws come from one seeded stream
//! in a fixed order (responders ascending, then vertices ascending, then
//! edges ascending).
//!
//! | Module     | Contents                                            |
//! |------------|-----------------------------------------------------|
//! | [`action`] | `Action`, `ActionMap`, outcomes and reject reasons  |
//! | [`fire`]   | Burn-out, preheating, and smoke formulas            |
//! | [`state`]  | `Occupancy`, `Responder`, `SimState`, `TickResult`  |
//! | [`sim`]    | `SimulationBuilder`, `Simulation`, the tick loop    |
//! | [`error`]  | `SimError`, `SimResult`                             |

pub mod action;
pub mod error;
pub mod fire;
pub mod sim;
pub mod state;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use action::{Action, ActionMap, ActionOutcome, RejectReason};
pub use error::{SimError, SimResult};
pub use sim::{Simulation, SimulationBuilder};
pub use state::{
    Discovered, Occupancy, Responder, ResponderView, SimEvent, SimState, Stats, TickResult,
};
