//! Rescue-item generation and assignment.
//!
//! # Shape of the search
//!
//! For every subset `S` of demand rooms with `1 ≤ |S| ≤ K` and every
//! allocation `v : S → ℕ⁺` with `Σv ≤ K`, `v(r) ≤ demand(r)`, the generator
//! scores all `(permutation, entry exit, drop exit)` choices and emits one
//! item carrying the best.  The loaded legs (everything after the first
//! pickup) cost double — a responder carrying people moves at half speed.
//!
//! Worst case this is `C(n,K)·K!·|Exits|²`, so candidate evaluations are
//! counted against [`Optimizer::max_candidates`]; on overflow the effective
//! K shrinks by one and generation restarts.  Items dominated by their
//! single-room decomposition are dropped as produced, never materialized.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use ev_core::VertexId;
use ev_graph::{dijkstra_from, find_exits, AllPairs, BuildingGraph};

use crate::item::RescueItem;

/// Soft cap on candidate evaluations per generation run.
pub const DEFAULT_MAX_CANDIDATES: usize = 200_000;

// ── Optimizer ─────────────────────────────────────────────────────────────────

/// Item generator configuration.  Constructed once by the model facade.
#[derive(Debug, Clone)]
pub struct Optimizer {
    /// Responder carry capacity K.
    pub capacity: u32,
    /// `w_f ≥ 0`: boosts rooms near the fire origin.
    pub fire_priority_weight: f64,
    /// `α ∈ [0,1]`: penalizes items that leave capacity unused.
    pub under_capacity_penalty: f64,
    /// Candidate-evaluation budget before the effective K degrades.
    pub max_candidates: usize,
}

impl Optimizer {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            fire_priority_weight: 0.0,
            under_capacity_penalty: 0.0,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    /// Generate the candidate item set for `demand` (room → observed
    /// incapable count) on the current graph.
    ///
    /// Rooms with no path to any exit are silently excluded — their
    /// occupants cannot be carried out on the current graph.
    pub fn generate(
        &self,
        graph: &BuildingGraph,
        fire_origin: VertexId,
        demand: &BTreeMap<VertexId, u32>,
    ) -> Vec<RescueItem> {
        let rooms: Vec<VertexId> = demand
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&room, _)| room)
            .collect();
        if rooms.is_empty() {
            return Vec::new();
        }
        let exits = find_exits(graph);

        let mut sources: Vec<VertexId> = rooms.clone();
        sources.extend_from_slice(&exits);
        let ap = AllPairs::over(graph, &sources);

        // Fire proximity boost, graph-distance based.
        let fire_dist: Option<FxHashMap<VertexId, f64>> = (self.fire_priority_weight > 0.0)
            .then(|| {
                let tree = dijkstra_from(graph, fire_origin);
                rooms
                    .iter()
                    .filter_map(|&r| tree.dist(r).map(|d| (r, d)))
                    .collect()
            });

        // Best single-room shuttle per room: the dominance yardstick.
        let mut single_time: FxHashMap<VertexId, f64> = FxHashMap::default();
        for &room in &rooms {
            if let Some((time, _, _)) = best_exit_pair(&ap, &exits, room, room) {
                single_time.insert(room, time);
            }
        }
        let usable: Vec<VertexId> = rooms
            .iter()
            .copied()
            .filter(|r| single_time.contains_key(r))
            .collect();
        if usable.is_empty() {
            tracing::warn!("no demand room can reach an exit; zero items");
            return Vec::new();
        }

        // Degrade K until the candidate budget holds.
        let k_max = self.capacity.min(usable.len() as u32).max(1);
        for k_eff in (1..=k_max).rev() {
            let ctx = GenContext {
                graph,
                ap: &ap,
                exits: &exits,
                demand,
                fire_dist: fire_dist.as_ref(),
                single_time: &single_time,
                capacity: self.capacity,
                fire_priority_weight: self.fire_priority_weight,
                under_capacity_penalty: self.under_capacity_penalty,
                budget: if k_eff == 1 { usize::MAX } else { self.max_candidates },
            };
            match ctx.run(&usable, k_eff as usize) {
                Some(items) => {
                    tracing::info!(
                        rooms = usable.len(),
                        k_eff,
                        items = items.len(),
                        "rescue items generated"
                    );
                    return items;
                }
                None => {
                    tracing::warn!(
                        k_eff,
                        budget = self.max_candidates,
                        "item generation over budget; shrinking K"
                    );
                }
            }
        }
        unreachable!("k_eff = 1 generation is unbudgeted");
    }
}

/// Cheapest `(time, entry, drop)` over all ordered exit pairs for a route
/// whose first pickup is `first` and last pickup is `last`.  Entry leg is
/// unloaded (1×); the leg to the drop exit is loaded (2×).
fn best_exit_pair(
    ap: &AllPairs,
    exits: &[VertexId],
    first: VertexId,
    last: VertexId,
) -> Option<(f64, VertexId, VertexId)> {
    let mut best: Option<(f64, VertexId, VertexId)> = None;
    for &e_in in exits {
        let Some(d_in) = ap.dist(e_in, first) else {
            continue;
        };
        for &e_out in exits {
            let Some(d_out) = ap.dist(last, e_out) else {
                continue;
            };
            let time = d_in + 2.0 * d_out;
            if best.is_none_or(|(t, _, _)| time < t) {
                best = Some((time, e_in, e_out));
            }
        }
    }
    best
}

// ── Generation context ────────────────────────────────────────────────────────

struct GenContext<'a> {
    graph: &'a BuildingGraph,
    ap: &'a AllPairs,
    exits: &'a [VertexId],
    demand: &'a BTreeMap<VertexId, u32>,
    fire_dist: Option<&'a FxHashMap<VertexId, f64>>,
    single_time: &'a FxHashMap<VertexId, f64>,
    capacity: u32,
    fire_priority_weight: f64,
    under_capacity_penalty: f64,
    budget: usize,
}

impl<'a> GenContext<'a> {
    /// Enumerate subsets and allocations up to size `k_eff`.  Returns `None`
    /// if the candidate budget was exhausted.
    fn run(&self, rooms: &[VertexId], k_eff: usize) -> Option<Vec<RescueItem>> {
        let mut items = Vec::new();
        let mut evaluated = 0usize;
        let mut subset = Vec::with_capacity(k_eff);
        let ok = self.subsets(rooms, 0, k_eff, &mut subset, &mut evaluated, &mut items);
        ok.then_some(items)
    }

    fn subsets(
        &self,
        rooms: &[VertexId],
        from: usize,
        k_eff: usize,
        subset: &mut Vec<VertexId>,
        evaluated: &mut usize,
        items: &mut Vec<RescueItem>,
    ) -> bool {
        if !subset.is_empty() {
            let spare = self.capacity - subset.len() as u32;
            let mut counts = Vec::with_capacity(subset.len());
            if !self.allocations(subset, 0, spare, &mut counts, evaluated, items) {
                return false;
            }
        }
        if subset.len() == k_eff {
            return true;
        }
        for i in from..rooms.len() {
            subset.push(rooms[i]);
            if !self.subsets(rooms, i + 1, k_eff, subset, evaluated, items) {
                return false;
            }
            subset.pop();
        }
        true
    }

    /// Enumerate allocations: each room gets ≥ 1, bounded by its demand;
    /// `spare` is the capacity left beyond the implicit 1-per-room.
    fn allocations(
        &self,
        subset: &[VertexId],
        idx: usize,
        spare: u32,
        counts: &mut Vec<u32>,
        evaluated: &mut usize,
        items: &mut Vec<RescueItem>,
    ) -> bool {
        if idx == subset.len() {
            return self.score_allocation(subset, counts, evaluated, items);
        }
        let room_demand = self.demand[&subset[idx]];
        let max_extra = spare.min(room_demand.saturating_sub(1));
        for extra in 0..=max_extra {
            counts.push(1 + extra);
            if !self.allocations(subset, idx + 1, spare - extra, counts, evaluated, items) {
                return false;
            }
            counts.pop();
        }
        true
    }

    /// Score every `(permutation, exit pair)` of one `(S, v)` and emit the
    /// winner unless it is dominated by its single-room decomposition.
    fn score_allocation(
        &self,
        subset: &[VertexId],
        counts: &[u32],
        evaluated: &mut usize,
        items: &mut Vec<RescueItem>,
    ) -> bool {
        let mut order: Vec<usize> = (0..subset.len()).collect();
        let mut best: Option<(f64, Vec<VertexId>, VertexId, VertexId)> = None;

        // Heap's algorithm, iterative, deterministic order.
        let mut c = vec![0usize; order.len()];
        loop {
            *evaluated += self.exits.len() * self.exits.len();
            if *evaluated > self.budget {
                return false;
            }
            self.score_permutation(subset, &order, &mut best);

            // Advance to the next permutation.
            let mut i = 0;
            loop {
                if i >= order.len() {
                    // All permutations exhausted.
                    self.emit(subset, counts, best, items);
                    return true;
                }
                if c[i] < i {
                    if i % 2 == 0 {
                        order.swap(0, i);
                    } else {
                        order.swap(c[i], i);
                    }
                    c[i] += 1;
                    break;
                }
                c[i] = 0;
                i += 1;
            }
        }
    }

    fn score_permutation(
        &self,
        subset: &[VertexId],
        order: &[usize],
        best: &mut Option<(f64, Vec<VertexId>, VertexId, VertexId)>,
    ) {
        let seq: Vec<VertexId> = order.iter().map(|&i| subset[i]).collect();

        // Loaded inter-room legs (2×).
        let mut mid = 0.0;
        for pair in seq.windows(2) {
            let Some(d) = self.ap.dist(pair[0], pair[1]) else {
                return;
            };
            mid += 2.0 * d;
        }
        let Some((ends, e_in, e_out)) =
            best_exit_pair(self.ap, self.exits, seq[0], seq[seq.len() - 1])
        else {
            return;
        };
        let time = ends + mid;
        if best.as_ref().is_none_or(|(t, _, _, _)| time < *t) {
            *best = Some((time, seq, e_in, e_out));
        }
    }

    fn emit(
        &self,
        subset: &[VertexId],
        counts: &[u32],
        best: Option<(f64, Vec<VertexId>, VertexId, VertexId)>,
        items: &mut Vec<RescueItem>,
    ) {
        let Some((time, seq, e_in, e_out)) = best else {
            return;
        };
        if time <= 0.0 {
            return;
        }

        // Streaming dominance pruning: a multi-room item no cheaper than its
        // single-room shuttles can never beat them under the greedy policy.
        if subset.len() >= 2 {
            let decomposed: f64 = subset.iter().map(|r| self.single_time[r]).sum();
            if time >= decomposed {
                return;
            }
        }

        let vector: BTreeMap<VertexId, u32> = subset
            .iter()
            .copied()
            .zip(counts.iter().copied())
            .collect();
        let passengers: u32 = counts.iter().sum();

        // Priority-weighted value with optional fire-proximity boost.
        let mut value_raw = 0.0;
        for (&room, &count) in &vector {
            let mut term = count as f64 * self.graph.vertex(room).priority;
            if let Some(fire_dist) = self.fire_dist {
                let d = fire_dist.get(&room).copied().unwrap_or(f64::INFINITY);
                term *= 1.0 + self.fire_priority_weight / (1.0 + d);
            }
            value_raw += term;
        }
        if passengers < self.capacity {
            value_raw *= 1.0 - self.under_capacity_penalty * (self.capacity - passengers) as f64;
        }
        if value_raw <= 0.0 {
            return;
        }

        // Concrete walk entry → rooms → drop.
        let mut full_path = vec![e_in];
        let mut cursor = e_in;
        for &stop in seq.iter().chain(std::iter::once(&e_out)) {
            let Some(leg) = self.ap.path(cursor, stop) else {
                return;
            };
            full_path.extend_from_slice(&leg[1..]);
            cursor = stop;
        }

        items.push(RescueItem {
            vector,
            visit_sequence: seq,
            entry_exit: e_in,
            drop_exit: e_out,
            full_path,
            time,
            value: value_raw / time,
        });
    }
}

// ── Assignment ────────────────────────────────────────────────────────────────

/// Where a responder would begin its next item, and how busy it already is.
#[derive(Debug, Clone, Copy)]
pub struct SelectorStart {
    pub position: VertexId,
    /// Execution time already queued, in the optimizer's unit-hop scale.
    pub busy_time: f64,
    /// `false` for trapped responders — they receive no items.
    pub available: bool,
}

/// Item-selection policy: turns the candidate set into per-responder queues
/// without over-committing any room's occupants.
///
/// Two implementations exist: [`GreedySelector`] (the default) and, behind
/// the `lp` feature, [`LpSelector`].  Selected at model construction.
pub trait ItemSelector {
    fn assign(
        &self,
        graph: &BuildingGraph,
        items: Vec<RescueItem>,
        demand: &BTreeMap<VertexId, u32>,
        starts: &[SelectorStart],
    ) -> Vec<Vec<RescueItem>>;
}

/// Value-density greedy: walk items best-first, hand each to the responder
/// with the lowest marginal completion time.
pub struct GreedySelector;

impl ItemSelector for GreedySelector {
    fn assign(
        &self,
        graph: &BuildingGraph,
        mut items: Vec<RescueItem>,
        demand: &BTreeMap<VertexId, u32>,
        starts: &[SelectorStart],
    ) -> Vec<Vec<RescueItem>> {
        sort_by_value(&mut items);
        assign_in_order(graph, items, demand, starts)
    }
}

/// Deterministic best-first ordering: value desc, then time asc, then the
/// room vector as a final tie-break.
fn sort_by_value(items: &mut [RescueItem]) {
    items.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.time
                    .partial_cmp(&b.time)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then_with(|| a.vector.cmp(&b.vector))
    });
}

/// Shared assignment pass: consume `items` in the given order, respecting
/// per-room supply and picking the cheapest responder for each.
fn assign_in_order(
    graph: &BuildingGraph,
    items: Vec<RescueItem>,
    demand: &BTreeMap<VertexId, u32>,
    starts: &[SelectorStart],
) -> Vec<Vec<RescueItem>> {
    let mut remaining: BTreeMap<VertexId, u32> = demand.clone();
    let mut queues: Vec<Vec<RescueItem>> = vec![Vec::new(); starts.len()];
    let mut ends: Vec<VertexId> = starts.iter().map(|s| s.position).collect();
    let mut busy: Vec<f64> = starts.iter().map(|s| s.busy_time).collect();

    let mut ap = AllPairs::new();

    for item in items {
        let feasible = item
            .vector
            .iter()
            .all(|(room, &count)| remaining.get(room).copied().unwrap_or(0) >= count);
        if !feasible {
            continue;
        }

        // Cheapest responder by marginal completion time.
        let mut chosen: Option<(f64, usize)> = None;
        for (i, start) in starts.iter().enumerate() {
            if !start.available {
                continue;
            }
            let tree = ap.ensure(graph, ends[i]);
            let Some(approach) = tree.dist(item.entry_exit) else {
                continue;
            };
            let marginal = busy[i] + approach + item.time;
            if chosen.is_none_or(|(t, _)| marginal < t) {
                chosen = Some((marginal, i));
            }
        }
        let Some((marginal, i)) = chosen else {
            continue;
        };

        for (room, &count) in &item.vector {
            *remaining.get_mut(room).expect("feasibility checked") -= count;
        }
        busy[i] = marginal;
        ends[i] = item.drop_exit;
        queues[i].push(item);
    }

    queues
}

// ── LP variant ────────────────────────────────────────────────────────────────

/// LP-relaxation selector: solve `max Σ xᵢ·valueᵢ` over `xᵢ ∈ [0,1]` subject
/// to per-room supply, then round greedily by descending `xᵢ`.
///
/// Analysis-oriented; the greedy selector remains the default policy.
#[cfg(feature = "lp")]
pub struct LpSelector;

#[cfg(feature = "lp")]
impl ItemSelector for LpSelector {
    fn assign(
        &self,
        graph: &BuildingGraph,
        items: Vec<RescueItem>,
        demand: &BTreeMap<VertexId, u32>,
        starts: &[SelectorStart],
    ) -> Vec<Vec<RescueItem>> {
        use minilp::{ComparisonOp, OptimizationDirection, Problem};

        if items.is_empty() {
            return vec![Vec::new(); starts.len()];
        }

        let mut problem = Problem::new(OptimizationDirection::Maximize);
        let vars: Vec<minilp::Variable> = items
            .iter()
            .map(|item| problem.add_var(item.value, (0.0, 1.0)))
            .collect();

        for (&room, &supply) in demand {
            let terms: Vec<(minilp::Variable, f64)> = items
                .iter()
                .zip(&vars)
                .filter_map(|(item, &var)| {
                    item.vector.get(&room).map(|&count| (var, count as f64))
                })
                .collect();
            if !terms.is_empty() {
                problem.add_constraint(&terms, ComparisonOp::Le, supply as f64);
            }
        }

        let mut ordered = items;
        match problem.solve() {
            Ok(solution) => {
                let mut scored: Vec<(f64, RescueItem)> = ordered
                    .into_iter()
                    .zip(&vars)
                    .map(|(item, &var)| (solution[var], item))
                    .collect();
                scored.sort_by(|(xa, a), (xb, b)| {
                    xb.partial_cmp(xa)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(
                            b.value
                                .partial_cmp(&a.value)
                                .unwrap_or(std::cmp::Ordering::Equal),
                        )
                        .then_with(|| a.vector.cmp(&b.vector))
                });
                ordered = scored.into_iter().map(|(_, item)| item).collect();
            }
            Err(e) => {
                tracing::warn!(error = %e, "LP solve failed; using value order");
                sort_by_value(&mut ordered);
            }
        }

        assign_in_order(graph, ordered, demand, starts)
    }
}
