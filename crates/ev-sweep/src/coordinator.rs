//! Tick-by-tick sweep dispatch.
//!
//! The coordinator owns the per-responder tours produced at construction and
//! turns them into actions every tick:
//!
//! 1. passing an exit while carrying → `DropOff`;
//! 2. standing in a room with uninstructed capables → `Instruct`;
//! 3. room has incapables, spare carry capacity, and the leg to the next
//!    stop passes through an exit → opportunistic `PickUp` (delivery on the
//!    way costs nothing; every other pickup belongs to the optimizer);
//! 4. otherwise `Move` one hop along the cached leg toward the next target,
//!    re-routing around cleared edges and deferring rooms that have become
//!    unreachable.
//!
//! Moving into a not-yet-observed room ends the responder's tick early so
//! the next decide can see what was found there.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use ev_core::{ResponderId, SimRng, Tick, VertexId};
use ev_graph::{bfs_hops, ExitField, UNREACHABLE};
use ev_sim::{Action, ActionMap, SimState};

use crate::cluster::partition_rooms;
use crate::tour::plan_tour;
use crate::SweepResult;

/// Ticks without any responder reducing its remaining-room count before the
/// sweep is declared complete anyway (remaining rooms presumed unreachable).
pub const DEFAULT_STALL_WINDOW: u64 = 20;

pub struct SweepCoordinator {
    /// Remaining room targets per responder, in tour order.
    targets: Vec<VecDeque<VertexId>>,
    /// Cached concrete leg per responder (`legs[i][0]` = expected position).
    legs: Vec<Vec<VertexId>>,
    /// Rooms currently assigned to nobody because no responder can reach
    /// them; re-assigned if an alternate route appears.
    deferred: FxHashSet<VertexId>,
    /// Every room-of-interest at sweep start.
    rooms: Vec<VertexId>,
    stall_window: u64,
    last_progress_tick: Tick,
    last_remaining: usize,
    complete: bool,
}

impl SweepCoordinator {
    /// Partition rooms and plan tours from the initial snapshot.
    pub fn new(state: &SimState, sweep_seed: u64, stall_window: u64) -> SweepResult<Self> {
        let graph = &state.graph;
        let rooms: Vec<VertexId> = graph
            .vertex_ids()
            .filter(|&v| graph.vertex(v).kind.is_room() && !graph.vertex(v).burned)
            .collect();
        let starts: Vec<VertexId> = state.responders.iter().map(|r| r.position).collect();

        let mut rng = SimRng::new(sweep_seed);
        let clustering = partition_rooms(graph, &rooms, &starts, &mut rng)?;

        let mut targets = Vec::with_capacity(starts.len());
        let mut deferred: FxHashSet<VertexId> =
            clustering.unreachable.iter().copied().collect();
        for (i, cluster) in clustering.clusters.iter().enumerate() {
            let tour = plan_tour(graph, starts[i], cluster);
            deferred.extend(tour.skipped.iter().copied());
            targets.push(tour.stops.into_iter().collect());
        }

        let last_remaining =
            targets.iter().map(VecDeque::len).sum::<usize>() + deferred.len();
        tracing::info!(
            rooms = rooms.len(),
            responders = starts.len(),
            deferred = deferred.len(),
            "sweep tours planned"
        );

        Ok(Self {
            legs: vec![Vec::new(); starts.len()],
            targets,
            deferred,
            rooms,
            stall_window,
            last_progress_tick: state.tick,
            last_remaining,
            complete: false,
        })
    }

    /// `true` once the completion predicate (or the stall window) has fired.
    /// Monotonic.
    pub fn complete(&self) -> bool {
        self.complete
    }

    /// Update bookkeeping against a fresh snapshot: mark visited rooms off
    /// the tours, re-assign deferred rooms that became reachable, advance the
    /// stall detector, and evaluate the completion predicate.
    ///
    /// Call once per tick, before [`decide`](Self::decide).
    pub fn refresh(&mut self, state: &SimState) {
        if self.complete {
            return;
        }
        let graph = &state.graph;

        // A room visited by anyone (or burned down) needs no further visit.
        let visited_or_gone = |v: VertexId| {
            graph.vertex(v).burned
                || state.responders.iter().any(|r| r.visited.contains(&v))
        };
        for queue in &mut self.targets {
            queue.retain(|&v| !visited_or_gone(v));
        }
        self.deferred.retain(|&v| !visited_or_gone(v));

        // Deferred rooms that an alternate route now reaches go back to the
        // nearest responder's queue.
        let mut reassigned: Vec<VertexId> = Vec::new();
        for &room in &self.deferred {
            let hops = bfs_hops(graph, room);
            let best = state
                .responders
                .iter()
                .enumerate()
                .map(|(i, r)| (hops[r.position.index()], i))
                .filter(|&(d, _)| d != UNREACHABLE)
                .min();
            if let Some((_, i)) = best {
                self.targets[i].push_back(room);
                reassigned.push(room);
            }
        }
        for room in reassigned {
            self.deferred.remove(&room);
        }

        // ── Stall detection ───────────────────────────────────────────────
        let remaining =
            self.targets.iter().map(VecDeque::len).sum::<usize>() + self.deferred.len();
        if remaining < self.last_remaining {
            self.last_remaining = remaining;
            self.last_progress_tick = state.tick;
        }
        let stalled = remaining > 0
            && state.tick.since(self.last_progress_tick) >= self.stall_window;
        if stalled {
            tracing::warn!(
                remaining,
                window = self.stall_window,
                "sweep stalled; declaring complete"
            );
        }

        // ── Completion predicate ──────────────────────────────────────────
        let rooms_covered = self.rooms.iter().all(|&room| {
            if visited_or_gone(room) {
                return true;
            }
            // Provably unreachable from every responder's current position.
            let hops = bfs_hops(graph, room);
            state
                .responders
                .iter()
                .all(|r| hops[r.position.index()] == UNREACHABLE)
        });
        let all_instructed = state.discovered.values().all(|d| d.capable == 0);

        // Opportunistic passengers picked up mid-tour get delivered before
        // the phase hands over; a trapped carrier can't block completion.
        let exit_field = ExitField::compute(graph);
        let deliveries_pending = state
            .responders
            .iter()
            .any(|r| r.carrying > 0 && exit_field.exit_reachable(r.position));

        if (rooms_covered && all_instructed && !deliveries_pending) || stalled {
            self.complete = true;
            tracing::info!(tick = %state.tick, stalled, "sweep complete");
        }
    }

    /// Emit this tick's actions for every responder.
    ///
    /// Expects [`refresh`](Self::refresh) to have run against `state` already.
    pub fn decide(&mut self, state: &SimState) -> ActionMap {
        let mut actions = ActionMap::new();
        if self.complete {
            return actions;
        }

        for i in 0..state.responders.len() {
            let list = self.decide_responder(i, state);
            if !list.is_empty() {
                actions.insert(ResponderId::from_index(i), list);
            }
        }
        actions
    }

    fn decide_responder(&mut self, i: usize, state: &SimState) -> Vec<Action> {
        let graph = &state.graph;
        let responder = &state.responders[i];
        let budget = responder.actions_per_tick as usize;

        let mut list: Vec<Action> = Vec::new();
        let mut pos = responder.position;
        let mut carrying = responder.carrying;
        // Local view of what we've already handled this tick.
        let mut instructed_here: FxHashSet<VertexId> = FxHashSet::default();
        let mut picked_here: FxHashSet<VertexId> = FxHashSet::default();

        while list.len() < budget {
            self.targets[i].retain(|&t| t != pos);

            // ① Passing an exit while carrying: unload.
            if carrying > 0 && graph.vertex(pos).kind.is_exit() {
                list.push(Action::DropOff);
                carrying = 0;
                continue;
            }

            let seen = state.discovered.get(&pos).copied().unwrap_or_default();

            // ② Uninstructed capables here: instruct them.
            if seen.capable > 0 && !instructed_here.contains(&pos) {
                list.push(Action::Instruct);
                instructed_here.insert(pos);
                continue;
            }

            // ③ Advance toward the next target.
            let Some(target) = self.next_target(i, pos, state, carrying) else {
                break;
            };
            let leg = self.leg_towards(i, pos, target, state);
            let Some(leg) = leg else {
                // Room unreachable right now: defer and try another target.
                self.targets[i].retain(|&t| t != target);
                if graph.vertex(target).kind.is_room() {
                    self.deferred.insert(target);
                    tracing::debug!(room = %target, "sweep target deferred (unreachable)");
                }
                continue;
            };

            // Opportunistic pickup, only when delivery costs no detour: the
            // leg to the next stop passes through an exit anyway.  Anything
            // else is the optimizer's job after the sweep.
            let spare = responder.capacity.saturating_sub(carrying);
            if seen.incapable > 0
                && spare > 0
                && !picked_here.contains(&pos)
                && leg[1..].iter().any(|&v| graph.vertex(v).kind.is_exit())
            {
                let count = seen.incapable.min(spare);
                list.push(Action::PickUp { count });
                carrying += count;
                picked_here.insert(pos);
                continue;
            }

            if leg.len() < 2 {
                break; // already there; nothing further this tick
            }
            let next = leg[1];
            list.push(Action::Move { target: next });
            self.legs[i] = leg[1..].to_vec();
            pos = next;

            // Entering an unobserved room: stop and look around first.
            let unobserved = !state.discovered.contains_key(&next);
            if unobserved && graph.vertex(next).kind.is_room() {
                break;
            }
        }

        list
    }

    /// The next place responder `i` should be heading from `pos`.
    fn next_target(
        &self,
        i: usize,
        pos: VertexId,
        state: &SimState,
        carrying: u32,
    ) -> Option<VertexId> {
        if let Some(&room) = self.targets[i].front() {
            return Some(room);
        }

        // Post-tour: still-discovered rooms holding uninstructed capables,
        // nearest first.
        let hops = bfs_hops(&state.graph, pos);
        let revisit = state
            .discovered
            .iter()
            .filter(|(v, d)| d.capable > 0 && **v != pos)
            .map(|(&v, _)| (hops[v.index()], v))
            .filter(|&(d, _)| d != UNREACHABLE)
            .min();
        if let Some((_, room)) = revisit {
            return Some(room);
        }

        // Deliver any leftover passengers.
        if carrying > 0 {
            return ev_graph::nearest_exit(&state.graph, pos).map(|(exit, _)| exit);
        }
        None
    }

    /// A valid concrete leg from `pos` to `target`, reusing the cached one
    /// when its next edge still exists.
    fn leg_towards(
        &self,
        i: usize,
        pos: VertexId,
        target: VertexId,
        state: &SimState,
    ) -> Option<Vec<VertexId>> {
        let cached = &self.legs[i];
        let cache_ok = cached.len() >= 2
            && cached[0] == pos
            && *cached.last().unwrap() == target
            && state.graph.adjacent(cached[0], cached[1]);
        if cache_ok {
            return Some(cached.clone());
        }
        ev_graph::bfs_exists(&state.graph, pos, target)
    }
}
