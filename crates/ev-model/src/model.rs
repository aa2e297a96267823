//! The `RescueModel` facade and its configuration.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use ev_core::{EdgeId, Phase, VertexId};
use ev_rescue::{GreedySelector, ItemSelector, Optimizer, RescueItem, TacticalCoordinator};
use ev_sim::{ActionMap, SimState};
use ev_sweep::SweepCoordinator;

// ── ModelConfig ───────────────────────────────────────────────────────────────

/// All tuning recognized at model construction.  No global state: every knob
/// is an explicit field here.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Select the LP item selector instead of greedy (requires the `lp`
    /// feature; falls back to greedy with a warning otherwise).
    pub use_lp: bool,
    /// `w_f ≥ 0`: optimizer boost for rooms near the fire origin.
    pub fire_priority_weight: f64,
    /// `α ∈ [0, 1]`: optimizer discount on items below carry capacity.
    pub under_capacity_penalty: f64,
    /// Responder carry capacity K, as the optimizer should assume it.
    pub k_capacity: u32,
    /// Seed for deterministic k-medoids tie-breaking.
    pub sweep_seed: u64,
    /// Sweep stall window W, in ticks.
    pub stall_window_ticks: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            use_lp: false,
            fire_priority_weight: 0.0,
            under_capacity_penalty: 0.0,
            k_capacity: 3,
            sweep_seed: 0,
            stall_window_ticks: ev_sweep::coordinator::DEFAULT_STALL_WINDOW,
        }
    }
}

// ── RescueModel ───────────────────────────────────────────────────────────────

/// The two-phase controller: sweeps, transitions once, then executes and
/// re-plans rescue items.
pub struct RescueModel {
    config: ModelConfig,
    phase: Phase,
    optimizer: Optimizer,
    selector: Box<dyn ItemSelector>,
    /// Built on the first `decide` from the initial snapshot.
    sweep: Option<SweepCoordinator>,
    /// Built at the phase transition.
    tactical: Option<TacticalCoordinator>,
    /// Existing-edge set at the previous decide; the replan trigger.
    known_edges: Option<FxHashSet<EdgeId>>,
    replan_count: u32,
    /// Every item ever handed to the tactical coordinator, in assignment
    /// order (initial plan first, then per replan).
    planned: Vec<RescueItem>,
}

impl RescueModel {
    pub fn new(config: ModelConfig) -> Self {
        let mut optimizer = Optimizer::new(config.k_capacity.max(1));
        optimizer.fire_priority_weight = config.fire_priority_weight.max(0.0);
        optimizer.under_capacity_penalty = config.under_capacity_penalty.clamp(0.0, 1.0);

        let selector: Box<dyn ItemSelector> = if config.use_lp {
            #[cfg(feature = "lp")]
            {
                Box::new(ev_rescue::LpSelector)
            }
            #[cfg(not(feature = "lp"))]
            {
                tracing::warn!("use_lp requested without the `lp` feature; using greedy");
                Box::new(GreedySelector)
            }
        } else {
            Box::new(GreedySelector)
        };

        Self {
            config,
            phase: Phase::Sweep,
            optimizer,
            selector,
            sweep: None,
            tactical: None,
            known_edges: None,
            replan_count: 0,
            planned: Vec::new(),
        }
    }

    // ── Observability ─────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Replan events handled so far (rescue-phase graph changes).
    pub fn replan_count(&self) -> u32 {
        self.replan_count
    }

    /// All items assigned so far, in assignment order.
    pub fn planned_items(&self) -> &[RescueItem] {
        &self.planned
    }

    // ── Per-tick entry point ──────────────────────────────────────────────

    /// Produce this tick's actions from the snapshot.
    pub fn decide(&mut self, state: &SimState) -> ActionMap {
        // Replan trigger: any edge gone since the last decide?
        let existing: FxHashSet<EdgeId> = state.existing_edges().iter().copied().collect();
        let graph_changed = self
            .known_edges
            .as_ref()
            .is_some_and(|known| *known != existing);
        self.known_edges = Some(existing);

        match self.phase {
            Phase::Sweep => {
                if self.sweep.is_none() {
                    match SweepCoordinator::new(
                        state,
                        self.config.sweep_seed,
                        self.config.stall_window_ticks,
                    ) {
                        Ok(sweep) => self.sweep = Some(sweep),
                        Err(e) => {
                            tracing::error!(error = %e, "cannot start sweep");
                            return ActionMap::new();
                        }
                    }
                }
                let sweep = self.sweep.as_mut().expect("installed above");
                sweep.refresh(state);
                if sweep.complete() {
                    self.transition(state);
                    // First rescue dispatch happens this very tick; the
                    // plan was just built against this snapshot.
                    self.rescue_decide(state, false)
                } else {
                    sweep.decide(state)
                }
            }
            Phase::Rescue => self.rescue_decide(state, graph_changed),
        }
    }

    // ── Phase transition ──────────────────────────────────────────────────

    /// One-time switch to RESCUE: run the optimizer on the snapshot and
    /// seed the tactical queues.
    fn transition(&mut self, state: &SimState) {
        self.phase = Phase::Rescue;
        let demand = observed_demand(state);
        tracing::info!(
            tick = %state.tick,
            rooms = demand.len(),
            passengers = demand.values().sum::<u32>(),
            "phase transition: sweep → rescue"
        );

        let mut tactical = TacticalCoordinator::new(state.responders.len());
        if !demand.is_empty() {
            let items = self
                .optimizer
                .generate(&state.graph, state.fire_origin, &demand);
            let starts = tactical.selector_starts(state);
            let queues = self
                .selector
                .assign(&state.graph, items, &demand, &starts);
            self.record(&queues);
            if let Err(e) = tactical.enqueue(queues) {
                tracing::error!(error = %e, "initial assignment rejected");
            }
        }
        self.tactical = Some(tactical);
    }

    // ── Rescue dispatch ───────────────────────────────────────────────────

    fn rescue_decide(&mut self, state: &SimState, graph_changed: bool) -> ActionMap {
        let Some(tactical) = self.tactical.as_mut() else {
            return ActionMap::new();
        };

        if graph_changed {
            self.replan_count += 1;
            let affected = tactical.collect_affected(state);
            tracing::info!(
                tick = %state.tick,
                replan = self.replan_count,
                affected_rooms = affected.len(),
                "rescue replan"
            );
            if !affected.is_empty() {
                let items = self
                    .optimizer
                    .generate(&state.graph, state.fire_origin, &affected);
                let starts = tactical.selector_starts(state);
                let queues = self
                    .selector
                    .assign(&state.graph, items, &affected, &starts);
                for (i, queue) in queues.iter().enumerate() {
                    debug_assert!(queue.is_empty() || !tactical.is_trapped(i));
                }
                self.planned
                    .extend(queues.iter().flatten().cloned());
                if let Err(e) = tactical.enqueue(queues) {
                    tracing::error!(error = %e, "replan assignment rejected");
                }
            }
        }

        tactical.decide(state)
    }

    fn record(&mut self, queues: &[Vec<RescueItem>]) {
        self.planned.extend(queues.iter().flatten().cloned());
    }
}

/// Observed rescue demand: discovered, unburned rooms with incapable
/// occupants still in them.
fn observed_demand(state: &SimState) -> BTreeMap<VertexId, u32> {
    state
        .discovered
        .iter()
        .filter(|&(&v, d)| {
            d.incapable > 0
                && state.graph.vertex(v).kind.is_room()
                && !state.graph.vertex(v).burned
        })
        .map(|(&v, d)| (v, d.incapable))
        .collect()
}
