//! Responder actions and their per-tick outcomes.
//!
//! The wire encoding (driver → kernel) is a map from responder id to an
//! ordered action list; each action is a tagged record
//! `{"type": "move", "target": 3}` etc.  Unknown JSON fields are ignored so
//! older drivers keep working against newer kernels.

use std::collections::BTreeMap;

use ev_core::{ResponderId, VertexId};

/// One responder action.  A tagged sum — no trait objects, no inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Step to an adjacent vertex through an existing edge with flow budget.
    Move { target: VertexId },
    /// Lift `count` incapable occupants at the current vertex.
    PickUp { count: u32 },
    /// Set down all carried occupants; only valid at an exit-kind vertex.
    DropOff,
    /// Mark every capable occupant at the current vertex as instructed.
    Instruct,
}

/// The per-tick action submission: ordered lists keyed by responder.
///
/// `BTreeMap` so iteration is in ascending responder id — the ordering the
/// determinism contract requires.
pub type ActionMap = BTreeMap<ResponderId, Vec<Action>>;

/// Why an action was rejected.  The action point is consumed either way and
/// later actions in the same list are still attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Move target is not joined to the current position by an existing edge.
    NoSuchEdge,
    /// The connecting edge's flow budget for this tick is exhausted.
    FlowExhausted,
    /// PickUp asked for more incapable occupants than the vertex holds.
    NotEnoughOccupants,
    /// PickUp would exceed the responder's carry capacity.
    OverCapacity,
    /// DropOff attempted away from an exit-kind vertex.
    NotAnExit,
    /// The action list was longer than the responder's points per tick.
    OutOfActionPoints,
    /// The submission named a responder id the simulation does not have.
    UnknownResponder,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::NoSuchEdge => "no such edge",
            RejectReason::FlowExhausted => "edge flow exhausted",
            RejectReason::NotEnoughOccupants => "not enough occupants",
            RejectReason::OverCapacity => "over carry capacity",
            RejectReason::NotAnExit => "not an exit",
            RejectReason::OutOfActionPoints => "out of action points",
            RejectReason::UnknownResponder => "unknown responder",
        };
        f.write_str(s)
    }
}

/// One attempted action and how it went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ActionOutcome {
    pub action: Action,
    /// `None` = success; `Some(reason)` = rejected (point still consumed).
    pub rejected: Option<RejectReason>,
}

impl ActionOutcome {
    #[inline]
    pub fn succeeded(&self) -> bool {
        self.rejected.is_none()
    }
}
