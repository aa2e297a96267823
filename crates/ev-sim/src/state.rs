//! Kernel state records, the fog-of-war snapshot, and per-tick results.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use ev_core::{EdgeId, ResponderId, Tick, VertexId};
use ev_graph::BuildingGraph;

use crate::action::ActionOutcome;

// ── Occupancy (kernel-internal) ───────────────────────────────────────────────

/// Ground-truth occupant counts at one vertex.  Never exposed to planners
/// directly; the snapshot only reveals counts for visited vertices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Occupancy {
    /// Capable occupants not yet told to evacuate.
    pub capable: u32,
    /// Capable occupants advancing toward the nearest exit on their own.
    pub instructed: u32,
    /// Occupants that must be carried.
    pub incapable: u32,
}

impl Occupancy {
    #[inline]
    pub fn total(&self) -> u32 {
        self.capable + self.instructed + self.incapable
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

// ── Responder ─────────────────────────────────────────────────────────────────

/// A firefighter agent — flat record, no behavior of its own.
#[derive(Debug, Clone)]
pub struct Responder {
    /// Carry capacity K.
    pub capacity: u32,
    /// Action points A per tick.
    pub actions_per_tick: u32,
    pub position: VertexId,
    /// Incapable occupants currently carried; always ≤ `capacity`.
    pub carrying: u32,
    /// Every vertex this responder has stood in.
    pub visited: FxHashSet<VertexId>,
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Observation of one responder in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponderView {
    pub position: VertexId,
    pub carrying: u32,
    pub capacity: u32,
    pub actions_per_tick: u32,
    pub visited: FxHashSet<VertexId>,
}

/// Last-observed occupant counts for a visited vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Discovered {
    pub capable: u32,
    pub instructed: u32,
    pub incapable: u32,
}

/// The observable simulation state returned by `Simulation::read`.
///
/// Fog-of-war respecting: `discovered` covers visited vertices only, and
/// nothing else in the snapshot reveals unvisited-room occupant counts.
/// Owned (cloned out of the kernel) so planners can hold it across the
/// subsequent `update` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    pub tick: Tick,
    /// Full topology with current edge existence and burned flags.
    pub graph: BuildingGraph,
    /// Per-vertex smoke volume, m³.
    pub smoke: Vec<f32>,
    pub fire_origin: VertexId,
    pub responders: Vec<ResponderView>,
    /// Visited vertices → last observed occupant counts.
    pub discovered: FxHashMap<VertexId, Discovered>,
    pub rescued: u32,
    pub dead: u32,
    pub total_initial: u32,
}

impl SimState {
    /// Occupants neither rescued nor dead (carried ones included).
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.total_initial - self.rescued - self.dead
    }

    /// Edge ids that currently exist, ascending.  The model facade diffs this
    /// set between ticks to detect replan events.
    pub fn existing_edges(&self) -> Vec<EdgeId> {
        self.graph
            .edge_ids()
            .filter(|&e| self.graph.edge(e).exists)
            .collect()
    }
}

// ── Tick results ──────────────────────────────────────────────────────────────

/// Something that happened inside one `update` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// A stochastic burn-out cleared this edge.
    EdgeBurned(EdgeId),
    /// Fire intensity crossed the ignition threshold here.
    VertexIgnited(VertexId),
    /// Occupants killed by the vertex igniting.
    FireDeaths { vertex: VertexId, count: u32 },
    /// Occupants killed by smoke this tick.
    SmokeDeaths { vertex: VertexId, count: u32 },
    /// Occupants delivered alive.  `responder` is `None` for instructed
    /// occupants who walked out on their own.
    Rescued {
        responder: Option<ResponderId>,
        vertex: VertexId,
        count: u32,
    },
    /// Capable occupants switched to autonomous egress.
    Instructed { vertex: VertexId, count: u32 },
}

/// The result bundle returned by every `Simulation::update`.
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    /// The tick that was just executed (pre-increment value).
    pub tick: Tick,
    pub action_results: BTreeMap<ResponderId, Vec<ActionOutcome>>,
    pub events: Vec<SimEvent>,
    pub rescued_this_tick: u32,
    pub dead_this_tick: u32,
}

// ── Run statistics ────────────────────────────────────────────────────────────

/// Aggregate run statistics, cheap to compute at any tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Stats {
    pub tick: u64,
    pub rescued: u32,
    pub dead: u32,
    pub remaining: u32,
    pub total_initial: u32,
    pub time_minutes: f64,
}
