//! The `Simulation` struct and its tick loop.
//!
//! # Tick anatomy (one `update` call)
//!
//! ```text
//! ① Actions     — per responder (ascending id), up to A actions in order;
//!                 a rejected action consumes its point, later ones still run.
//! ② Egress      — instructed occupants advance one hop toward the nearest
//!                 exit (ascending VertexId), bounded by edge flow budgets
//!                 and destination capacity.
//! ③ Burn-out    — each existing edge independently rolls burn-out
//!                 (ascending EdgeId) on the shared seeded stream.
//! ④ Fire        — preheating raises vertex intensity; crossing the
//!                 ignition threshold burns the room and kills its occupants.
//! ⑤ Smoke       — generation, diffusion over existing edges, death rolls.
//! ⑥ Bookkeeping — refresh observations, bump the tick counter.
//! ```
//!
//! The call is atomic: drivers submit all responders' actions together and
//! see the post-state only through [`Simulation::read`].

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use ev_core::{EdgeId, ResponderId, SimRng, Tick, VertexId, TICK_SECS};
use ev_graph::{find_exits, BuildingConfig, BuildingGraph, ExitField};

use crate::action::{Action, ActionMap, ActionOutcome, RejectReason};
use crate::fire;
use crate::state::{
    Discovered, Occupancy, Responder, ResponderView, SimEvent, SimState, Stats, TickResult,
};
use crate::{SimError, SimResult};

// ── Builder ───────────────────────────────────────────────────────────────────

/// Fluent constructor for [`Simulation`].
///
/// # Example
///
/// ```rust,ignore
/// let sim = SimulationBuilder::new(&config, 2, 42)
///     .fire_origin("storage_b")
///     .capacity(3)
///     .actions_per_tick(2)
///     .build()?;
/// ```
pub struct SimulationBuilder<'a> {
    config: &'a BuildingConfig,
    num_responders: usize,
    seed: u64,
    capacity: u32,
    actions_per_tick: u32,
    fire_origin: Option<String>,
}

impl<'a> SimulationBuilder<'a> {
    pub fn new(config: &'a BuildingConfig, num_responders: usize, seed: u64) -> Self {
        Self {
            config,
            num_responders,
            seed,
            capacity: 3,
            actions_per_tick: 2,
            fire_origin: None,
        }
    }

    /// Carry capacity K for every responder (default 3).
    pub fn capacity(mut self, k: u32) -> Self {
        self.capacity = k;
        self
    }

    /// Action points A per responder per tick (default 2).
    pub fn actions_per_tick(mut self, a: u32) -> Self {
        self.actions_per_tick = a;
        self
    }

    /// Override the config's fire origin by string vertex id.
    pub fn fire_origin(mut self, vertex_id: impl Into<String>) -> Self {
        self.fire_origin = Some(vertex_id.into());
        self
    }

    /// Validate the config and construct the initial world.
    pub fn build(self) -> SimResult<Simulation> {
        if self.num_responders == 0 {
            return Err(SimError::InvalidParam("num_responders must be ≥ 1".into()));
        }
        if self.capacity == 0 {
            return Err(SimError::InvalidParam("capacity must be ≥ 1".into()));
        }
        if self.actions_per_tick == 0 {
            return Err(SimError::InvalidParam("actions_per_tick must be ≥ 1".into()));
        }

        let resolved = self.config.resolve()?;
        let mut graph = resolved.graph;
        let names = resolved.names;

        let exits = find_exits(&graph);
        if exits.is_empty() {
            return Err(SimError::NoExits);
        }

        let fire_origin = match &self.fire_origin {
            None => resolved.fire_origin,
            Some(name) => *resolved
                .index
                .get(name)
                .ok_or_else(|| ev_graph::GraphError::UnknownVertex(name.clone()))?,
        };

        let n = graph.vertex_count();
        let mut rng = SimRng::new(self.seed);

        // ── Sample initial occupancy (ascending vertex order) ─────────────
        let mut occupancy = vec![Occupancy::default(); n];
        for v in 0..n {
            let Some(dist) = &resolved.occupancy[v] else {
                continue;
            };
            let capacity = graph.vertex(VertexId(v as u32)).capacity;
            let capable = sample_count(&dist.capable, &mut rng)?.min(capacity);
            let incapable =
                sample_count(&dist.incapable, &mut rng)?.min(capacity.saturating_sub(capable));
            occupancy[v] = Occupancy {
                capable,
                instructed: 0,
                incapable,
            };
        }
        let total_initial: u32 = occupancy.iter().map(Occupancy::total).sum();

        // ── Ignite the origin ─────────────────────────────────────────────
        let mut intensity = vec![0.0f64; n];
        let mut smoke = vec![0.0f32; n];
        let mut dead = 0;

        graph.mark_burned(fire_origin);
        intensity[fire_origin.index()] = 1.0;
        let origin_occ = occupancy[fire_origin.index()];
        if !origin_occ.is_empty() {
            dead += origin_occ.total();
            occupancy[fire_origin.index()] = Occupancy::default();
        }
        let origin_volume = graph.vertex(fire_origin).volume_m3();
        smoke[fire_origin.index()] =
            (resolved.initial_smoke_level.clamp(0.0, 1.0)) * origin_volume;

        // Rooms structurally adjacent to the origin keep generating smoke
        // even after connecting edges burn away.
        let origin_adjacent: FxHashSet<VertexId> = graph
            .incident_edges(fire_origin)
            .iter()
            .map(|&e| graph.edge(e).other_end(fire_origin))
            .collect();

        // ── Stage responders at exits (round-robin) ───────────────────────
        let mut responders = Vec::with_capacity(self.num_responders);
        let mut discovered = FxHashMap::default();
        for i in 0..self.num_responders {
            let position = exits[i % exits.len()];
            let mut visited = FxHashSet::default();
            visited.insert(position);
            discovered.insert(position, observe(&occupancy, position));
            responders.push(Responder {
                capacity: self.capacity,
                actions_per_tick: self.actions_per_tick,
                position,
                carrying: 0,
                visited,
            });
        }

        tracing::info!(
            vertices = n,
            edges = graph.edge_count(),
            responders = self.num_responders,
            total_initial,
            origin = %fire_origin,
            seed = self.seed,
            "simulation constructed"
        );

        Ok(Simulation {
            flow_used: vec![0; graph.edge_count()],
            graph,
            names,
            occupancy,
            discovered,
            responders,
            intensity,
            smoke,
            fire_origin,
            origin_adjacent,
            rng,
            tick: Tick::ZERO,
            rescued: 0,
            dead,
            total_initial,
        })
    }
}

/// Sample a count from a weight vector (`weights[n]` = weight of count `n`).
/// Empty or all-zero vectors sample 0; negative weights are a config error.
fn sample_count(weights: &[f64], rng: &mut SimRng) -> SimResult<u32> {
    if weights.iter().any(|&w| w < 0.0) {
        return Err(SimError::InvalidParam(
            "occupancy weights must be non-negative".into(),
        ));
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Ok(0);
    }
    let mut x = rng.gen_range(0.0..sum);
    for (count, &w) in weights.iter().enumerate() {
        if x < w {
            return Ok(count as u32);
        }
        x -= w;
    }
    Ok(weights.len() as u32 - 1)
}

fn observe(occupancy: &[Occupancy], v: VertexId) -> Discovered {
    let occ = occupancy[v.index()];
    Discovered {
        capable: occ.capable,
        instructed: occ.instructed,
        incapable: occ.incapable,
    }
}

// ── Simulation ────────────────────────────────────────────────────────────────

/// The simulation kernel: owns the graph, the ground-truth occupant tables,
/// the physics fields, and the single seeded stochastic stream.
pub struct Simulation {
    graph: BuildingGraph,
    /// Dense id → config string id, for logs and reports.
    names: Vec<String>,
    occupancy: Vec<Occupancy>,
    /// Visited vertices → last observed counts (what planners may see).
    discovered: FxHashMap<VertexId, Discovered>,
    responders: Vec<Responder>,
    /// Per-vertex fire intensity ∈ [0, 1].
    intensity: Vec<f64>,
    /// Per-vertex smoke volume, m³.
    smoke: Vec<f32>,
    fire_origin: VertexId,
    origin_adjacent: FxHashSet<VertexId>,
    rng: SimRng,
    tick: Tick,
    rescued: u32,
    dead: u32,
    total_initial: u32,
    /// Per-edge traversals consumed this tick; reset at tick start.
    flow_used: Vec<u32>,
}

impl Simulation {
    // ── Public API ────────────────────────────────────────────────────────

    /// Execute one atomic tick with the given responder actions.
    pub fn update(&mut self, actions: &ActionMap) -> TickResult {
        let rescued_before = self.rescued;
        let dead_before = self.dead;
        let mut events = Vec::new();
        self.flow_used.fill(0);

        // Occupants instructed during this tick's action phase begin moving
        // next tick; only the tick-start pool is movable below.
        let instructed_start: Vec<u32> = self.occupancy.iter().map(|o| o.instructed).collect();

        // ── ① Responder actions ───────────────────────────────────────────
        let mut action_results = BTreeMap::new();
        for (&rid, list) in actions {
            if rid.index() >= self.responders.len() {
                let outcomes = list
                    .iter()
                    .map(|&action| ActionOutcome {
                        action,
                        rejected: Some(RejectReason::UnknownResponder),
                    })
                    .collect();
                action_results.insert(rid, outcomes);
                continue;
            }
            let budget = self.responders[rid.index()].actions_per_tick as usize;
            let mut outcomes = Vec::with_capacity(list.len());
            for (i, &action) in list.iter().enumerate() {
                let rejected = if i >= budget {
                    Some(RejectReason::OutOfActionPoints)
                } else {
                    self.execute_action(rid, action, &mut events)
                };
                outcomes.push(ActionOutcome { action, rejected });
            }
            action_results.insert(rid, outcomes);
        }

        // ── ② Instructed egress ───────────────────────────────────────────
        self.step_instructed(&instructed_start, &mut events);

        // ── ③ Stochastic edge burn-out ────────────────────────────────────
        self.step_edge_burns(&mut events);

        // ── ④ Fire propagation and ignition ───────────────────────────────
        self.step_fire(&mut events);

        // ── ⑤ Smoke generation, diffusion, casualties ─────────────────────
        self.step_smoke(&mut events);

        // ── ⑥ Bookkeeping ─────────────────────────────────────────────────
        self.refresh_discovered();
        let result = TickResult {
            tick: self.tick,
            action_results,
            events,
            rescued_this_tick: self.rescued - rescued_before,
            dead_this_tick: self.dead - dead_before,
        };
        self.tick = self.tick + 1;
        result
    }

    /// Clone out the observable, fog-of-war-respecting state.
    pub fn read(&self) -> SimState {
        SimState {
            tick: self.tick,
            graph: self.graph.clone(),
            smoke: self.smoke.clone(),
            fire_origin: self.fire_origin,
            responders: self
                .responders
                .iter()
                .map(|r| ResponderView {
                    position: r.position,
                    carrying: r.carrying,
                    capacity: r.capacity,
                    actions_per_tick: r.actions_per_tick,
                    visited: r.visited.clone(),
                })
                .collect(),
            discovered: self.discovered.clone(),
            rescued: self.rescued,
            dead: self.dead,
            total_initial: self.total_initial,
        }
    }

    /// Aggregate run statistics.
    pub fn stats(&self) -> Stats {
        Stats {
            tick: self.tick.0,
            rescued: self.rescued,
            dead: self.dead,
            remaining: self.total_initial - self.rescued - self.dead,
            total_initial: self.total_initial,
            time_minutes: self.tick.minutes(),
        }
    }

    /// The config string id of a vertex (for reports).
    pub fn vertex_name(&self, v: VertexId) -> &str {
        &self.names[v.index()]
    }

    pub fn graph(&self) -> &BuildingGraph {
        &self.graph
    }

    pub fn fire_origin(&self) -> VertexId {
        self.fire_origin
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Clear an edge immediately, bypassing the stochastic roll.
    ///
    /// Scenario tooling: lets tests and what-if harnesses stage a burn at an
    /// exact tick instead of tuning `base_burn_rate` against a seed.  Uses
    /// the same sticky transition as the physics path.
    pub fn force_burn_edge(&mut self, e: EdgeId) {
        if self.graph.edge(e).exists {
            self.graph.clear_edge(e);
            tracing::debug!(edge = %e, tick = %self.tick, "edge force-burned");
        }
    }

    // ── Action execution ──────────────────────────────────────────────────

    fn execute_action(
        &mut self,
        rid: ResponderId,
        action: Action,
        events: &mut Vec<SimEvent>,
    ) -> Option<RejectReason> {
        let position = self.responders[rid.index()].position;
        match action {
            Action::Move { target } => {
                let Some(e) = self.graph.edge_between(position, target) else {
                    return Some(RejectReason::NoSuchEdge);
                };
                if self.flow_used[e.index()] >= self.graph.edge(e).max_flow {
                    return Some(RejectReason::FlowExhausted);
                }
                self.flow_used[e.index()] += 1;
                let responder = &mut self.responders[rid.index()];
                responder.position = target;
                responder.visited.insert(target);
                self.discovered.insert(target, observe(&self.occupancy, target));
                None
            }
            Action::PickUp { count } => {
                let occ = self.occupancy[position.index()];
                if occ.incapable < count {
                    return Some(RejectReason::NotEnoughOccupants);
                }
                let responder = &self.responders[rid.index()];
                if responder.carrying + count > responder.capacity {
                    return Some(RejectReason::OverCapacity);
                }
                self.occupancy[position.index()].incapable -= count;
                self.responders[rid.index()].carrying += count;
                self.discovered
                    .insert(position, observe(&self.occupancy, position));
                None
            }
            Action::DropOff => {
                if !self.graph.vertex(position).kind.is_exit() {
                    return Some(RejectReason::NotAnExit);
                }
                let carried = self.responders[rid.index()].carrying;
                if carried > 0 {
                    self.responders[rid.index()].carrying = 0;
                    self.rescued += carried;
                    events.push(SimEvent::Rescued {
                        responder: Some(rid),
                        vertex: position,
                        count: carried,
                    });
                }
                None
            }
            Action::Instruct => {
                let newly = self.occupancy[position.index()].capable;
                if newly > 0 {
                    self.occupancy[position.index()].capable = 0;
                    self.occupancy[position.index()].instructed += newly;
                    events.push(SimEvent::Instructed {
                        vertex: position,
                        count: newly,
                    });
                }
                self.discovered
                    .insert(position, observe(&self.occupancy, position));
                None
            }
        }
    }

    // ── Instructed egress ─────────────────────────────────────────────────

    fn step_instructed(&mut self, instructed_start: &[u32], events: &mut Vec<SimEvent>) {
        let field = ExitField::compute(&self.graph);
        let n = self.graph.vertex_count();
        // Arrivals buffer: occupants who moved this tick don't move again.
        let mut incoming = vec![0u32; n];

        for vi in 0..n {
            let v = VertexId(vi as u32);
            let waiting = self.occupancy[vi].instructed.min(instructed_start[vi]);
            if waiting == 0 {
                continue;
            }

            // Instructed occupants standing at an exit step outside.
            if self.graph.vertex(v).kind.is_exit() {
                self.occupancy[vi].instructed -= waiting;
                self.rescued += waiting;
                events.push(SimEvent::Rescued {
                    responder: None,
                    vertex: v,
                    count: waiting,
                });
                continue;
            }

            let next = field.next_hop[vi];
            if !next.is_valid() {
                continue; // no exit reachable; hold position
            }
            let Some(e) = self.graph.edge_between(v, next) else {
                continue;
            };

            let dest_is_exit = self.graph.vertex(next).kind.is_exit();
            for _ in 0..waiting {
                if self.flow_used[e.index()] >= self.graph.edge(e).max_flow {
                    break;
                }
                if !dest_is_exit {
                    let dest_load = self.occupancy[next.index()].total() + incoming[next.index()];
                    if dest_load >= self.graph.vertex(next).capacity {
                        break;
                    }
                }
                self.flow_used[e.index()] += 1;
                self.occupancy[vi].instructed -= 1;
                if dest_is_exit {
                    // Stepping through the exit door completes the egress.
                    self.rescued += 1;
                    events.push(SimEvent::Rescued {
                        responder: None,
                        vertex: next,
                        count: 1,
                    });
                } else {
                    incoming[next.index()] += 1;
                }
            }
        }

        for vi in 0..n {
            self.occupancy[vi].instructed += incoming[vi];
        }
    }

    // ── Physics ───────────────────────────────────────────────────────────

    fn step_edge_burns(&mut self, events: &mut Vec<SimEvent>) {
        let elapsed_secs = self.tick.0 as f64 * TICK_SECS;
        for ei in 0..self.graph.edge_count() {
            let e = EdgeId(ei as u32);
            if !self.graph.edge(e).exists {
                continue;
            }
            let p = fire::edge_burn_probability(&self.graph, e, self.fire_origin, elapsed_secs);
            if self.rng.gen_bool(p) {
                self.graph.clear_edge(e);
                events.push(SimEvent::EdgeBurned(e));
                tracing::debug!(edge = %e, tick = %self.tick, "edge burned out");
            }
        }
    }

    fn step_fire(&mut self, events: &mut Vec<SimEvent>) {
        let n = self.graph.vertex_count();
        // Double-buffer the deltas so the neighbor sum reads pre-tick values.
        let deltas: Vec<f64> = (0..n)
            .map(|vi| {
                let v = VertexId(vi as u32);
                if self.graph.vertex(v).burned {
                    0.0
                } else {
                    fire::preheat_delta(&self.graph, &self.intensity, v)
                }
            })
            .collect();

        for vi in 0..n {
            let v = VertexId(vi as u32);
            if self.graph.vertex(v).burned {
                self.intensity[vi] = 1.0;
                continue;
            }
            if deltas[vi] == 0.0 {
                continue;
            }
            self.intensity[vi] = (self.intensity[vi] + deltas[vi]).min(1.0);
            if self.intensity[vi] >= fire::IGNITION_THRESHOLD {
                self.graph.mark_burned(v);
                self.intensity[vi] = 1.0;
                events.push(SimEvent::VertexIgnited(v));
                tracing::debug!(vertex = %v, tick = %self.tick, "vertex ignited");

                let occ = self.occupancy[vi];
                if !occ.is_empty() {
                    self.dead += occ.total();
                    events.push(SimEvent::FireDeaths {
                        vertex: v,
                        count: occ.total(),
                    });
                    self.occupancy[vi] = Occupancy::default();
                }
                if self.discovered.contains_key(&v) {
                    self.discovered.insert(v, Discovered::default());
                }
            }
        }
    }

    fn step_smoke(&mut self, events: &mut Vec<SimEvent>) {
        let n = self.graph.vertex_count();

        // Generation: burned rooms and rooms structurally adjacent to the
        // origin, proportional to their intensity.
        for vi in 0..n {
            let v = VertexId(vi as u32);
            if !(self.graph.vertex(v).burned || self.origin_adjacent.contains(&v)) {
                continue;
            }
            let volume = self.graph.vertex(v).volume_m3();
            let generated = self.intensity[vi] as f32 * fire::SMOKE_GEN_RATE * TICK_SECS as f32;
            self.smoke[vi] = (self.smoke[vi] + generated).min(volume);
        }

        // Diffusion over existing edges, sequential in edge order.
        for ei in 0..self.graph.edge_count() {
            let e = EdgeId(ei as u32);
            let Some((from, to, amount)) = fire::smoke_transfer(&self.graph, &self.smoke, e) else {
                continue;
            };
            let headroom = self.graph.vertex(to).volume_m3() - self.smoke[to.index()];
            let amount = amount.min(self.smoke[from.index()]).min(headroom.max(0.0));
            if amount > 0.0 {
                self.smoke[from.index()] -= amount;
                self.smoke[to.index()] += amount;
            }
        }

        // Per-person death rolls, ascending vertex, capable → instructed →
        // incapable within a vertex.
        for vi in 0..n {
            let occ = self.occupancy[vi];
            if occ.is_empty() {
                continue;
            }
            let v = VertexId(vi as u32);
            let volume = self.graph.vertex(v).volume_m3();
            if volume <= 0.0 {
                continue;
            }
            let concentration = self.smoke[vi] / volume;
            let p = fire::smoke_death_probability(concentration);
            if p == 0.0 {
                continue;
            }
            let mut died = Occupancy::default();
            for _ in 0..occ.capable {
                if self.rng.gen_bool(p) {
                    died.capable += 1;
                }
            }
            for _ in 0..occ.instructed {
                if self.rng.gen_bool(p) {
                    died.instructed += 1;
                }
            }
            for _ in 0..occ.incapable {
                if self.rng.gen_bool(p) {
                    died.incapable += 1;
                }
            }
            if !died.is_empty() {
                self.occupancy[vi].capable -= died.capable;
                self.occupancy[vi].instructed -= died.instructed;
                self.occupancy[vi].incapable -= died.incapable;
                self.dead += died.total();
                events.push(SimEvent::SmokeDeaths {
                    vertex: v,
                    count: died.total(),
                });
            }
        }
    }

    fn refresh_discovered(&mut self) {
        for i in 0..self.responders.len() {
            let position = self.responders[i].position;
            self.discovered
                .insert(position, observe(&self.occupancy, position));
        }
    }
}
