//! Tick-by-tick execution of assigned rescue items, with replanning.
//!
//! Owns one ordered queue of [`ItemExecutionPlan`]s per responder.  Each tick
//! the front plan drives the responder: pick up where owed, drop off at the
//! plan's exit, otherwise advance along `full_path`.  Plans never mix across
//! responders.
//!
//! When the model facade detects a graph change it calls
//! [`TacticalCoordinator::collect_affected`], which truncates every active
//! plan to its still-reachable remainder and returns the union of lost
//! pickups for the optimizer to re-plan.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashSet;

use ev_core::{ResponderId, VertexId};
use ev_graph::{bfs_exists, nearest_exit};
use ev_sim::{Action, ActionMap, SimState};

use crate::item::{ItemExecutionPlan, RescueItem};
use crate::{RescueError, RescueResult};

pub struct TacticalCoordinator {
    queues: Vec<VecDeque<ItemExecutionPlan>>,
    /// Sticky: a responder with no route to any exit stops receiving moves.
    trapped: Vec<bool>,
}

impl TacticalCoordinator {
    pub fn new(num_responders: usize) -> Self {
        Self {
            queues: vec![VecDeque::new(); num_responders],
            trapped: vec![false; num_responders],
        }
    }

    /// Append assigned items (one queue per responder) as execution plans.
    ///
    /// The assignment must carry exactly one queue per responder — selectors
    /// always do; a mismatch means the caller mixed up snapshots.
    pub fn enqueue(&mut self, assignment: Vec<Vec<RescueItem>>) -> RescueResult<()> {
        if assignment.len() != self.queues.len() {
            return Err(RescueError::QueueCountMismatch {
                expected: self.queues.len(),
                got: assignment.len(),
            });
        }
        for (i, items) in assignment.into_iter().enumerate() {
            for item in items {
                self.queues[i].push_back(ItemExecutionPlan::new(item));
            }
        }
        Ok(())
    }

    /// `true` when every queue is empty — nothing left to execute.
    pub fn idle(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    pub fn is_trapped(&self, responder: usize) -> bool {
        self.trapped[responder]
    }

    /// Per-responder ends for the selector: where the responder will finish
    /// its current queue, and how much execution time is already booked.
    pub fn selector_starts(&self, state: &SimState) -> Vec<crate::optimizer::SelectorStart> {
        (0..self.queues.len())
            .map(|i| {
                let queue = &self.queues[i];
                let position = queue
                    .back()
                    .map(|plan| plan.item.drop_exit)
                    .unwrap_or(state.responders[i].position);
                let busy_time: f64 = queue.iter().map(|plan| plan.item.time).sum();
                crate::optimizer::SelectorStart {
                    position,
                    busy_time,
                    available: !self.trapped[i],
                }
            })
            .collect()
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    /// Emit this tick's actions for every responder with an active plan.
    pub fn decide(&mut self, state: &SimState) -> ActionMap {
        let mut actions = ActionMap::new();
        for i in 0..self.queues.len() {
            if self.trapped[i] {
                continue;
            }
            let list = self.decide_responder(i, state);
            if !list.is_empty() {
                actions.insert(ResponderId::from_index(i), list);
            }
        }
        actions
    }

    fn decide_responder(&mut self, i: usize, state: &SimState) -> Vec<Action> {
        let responder = &state.responders[i];
        let budget = responder.actions_per_tick as usize;
        let mut list = Vec::new();
        let mut pos = responder.position;
        let mut carrying = responder.carrying;

        while list.len() < budget {
            // Advance past finished plans.
            while self.queues[i].front().is_some_and(|p| p.completed) {
                self.queues[i].pop_front();
            }
            let Some(plan) = self.queues[i].front_mut() else {
                // Queue drained: deliver any leftover passengers, then rest.
                if carrying > 0 {
                    if state.graph.vertex(pos).kind.is_exit() {
                        list.push(Action::DropOff);
                        carrying = 0;
                        continue;
                    }
                    if let Some((_, path)) = nearest_exit(&state.graph, pos) {
                        list.push(Action::Move { target: path[1] });
                        pos = path[1];
                        continue;
                    }
                }
                break;
            };

            // Re-sync: a rejected move leaves the index ahead of reality,
            // and a freshly assigned item starts at its entry exit, which
            // may be across the building.
            if plan.expected_position() != pos {
                match plan.item.full_path[..=plan.current_index]
                    .iter()
                    .rposition(|&v| v == pos)
                {
                    Some(idx) => plan.current_index = idx,
                    None => {
                        // Approach leg: walk toward where the plan begins.
                        let Some(approach) =
                            bfs_exists(&state.graph, pos, plan.expected_position())
                        else {
                            break; // replan hook will rebuild from `pos`
                        };
                        list.push(Action::Move { target: approach[1] });
                        pos = approach[1];
                        continue;
                    }
                }
            }

            // Passengers carried in from before this plan's first pickup get
            // dropped at the entry exit rather than hauled along.
            if carrying > 0
                && plan.picked_up.is_empty()
                && state.graph.vertex(pos).kind.is_exit()
            {
                list.push(Action::DropOff);
                carrying = 0;
                continue;
            }

            // ② Owed pickups at the current vertex.
            let pending = plan.pending(pos);
            if pending > 0 && carrying < responder.capacity {
                let count = pending.min(responder.capacity - carrying);
                list.push(Action::PickUp { count });
                *plan.picked_up.entry(pos).or_insert(0) += count;
                carrying += count;
                continue;
            }

            // ③ Arrived at the drop exit with passengers.
            let at_path_end = plan.current_index + 1 >= plan.item.full_path.len();
            if pos == plan.item.drop_exit && at_path_end {
                if carrying > 0 {
                    list.push(Action::DropOff);
                    carrying = 0;
                    continue;
                }
                plan.completed = true;
                continue;
            }

            // ④ Advance along the path.
            if at_path_end {
                // Path exhausted but pickups remain owed elsewhere — the
                // route was truncated mid-plan.  Nothing more to do here.
                plan.completed = true;
                continue;
            }
            let next = plan.item.full_path[plan.current_index + 1];
            if !state.graph.adjacent(pos, next) {
                // PlanInvalidated: a path edge burned since generation.  The
                // model's replan detector rebuilds this plan next tick.
                tracing::debug!(
                    responder = i,
                    from = %pos,
                    to = %next,
                    "plan path broken; awaiting replan"
                );
                break;
            }
            list.push(Action::Move { target: next });
            plan.current_index += 1;
            pos = next;
        }

        list
    }

    // ── Replan hook ───────────────────────────────────────────────────────

    /// Truncate every responder's plans to what the current graph still
    /// supports and return the union of lost pickups (the affected vector).
    ///
    /// Responders with no route to any exit are marked trapped; their whole
    /// queue drains into the affected vector.
    pub fn collect_affected(&mut self, state: &SimState) -> BTreeMap<VertexId, u32> {
        let graph = &state.graph;
        let mut affected: BTreeMap<VertexId, u32> = BTreeMap::new();

        for i in 0..self.queues.len() {
            let position = state.responders[i].position;

            // Trapped check first: no exit means nothing is deliverable.
            let fallback = nearest_exit(graph, position);
            if fallback.is_none() {
                if !self.trapped[i] {
                    self.trapped[i] = true;
                    tracing::warn!(responder = i, position = %position, "responder trapped");
                }
                for plan in self.queues[i].drain(..) {
                    for (&room, _) in &plan.item.vector {
                        let pending = plan.pending(room);
                        if pending > 0 {
                            *affected.entry(room).or_insert(0) += pending;
                        }
                    }
                }
                continue;
            }
            let (fallback_exit, _) = fallback.expect("checked above");

            // Current plan: truncate to the reachable remainder.
            if let Some(plan) = self.queues[i].front_mut() {
                // The plan's expected position may be stale after rejected
                // moves; anchor reachability at the responder's real spot.
                if plan.expected_position() != position {
                    plan.item.full_path = vec![position];
                    plan.current_index = 0;
                }
                let mut reachable = FxHashSet::default();
                let mut unreachable = FxHashSet::default();
                for &room in plan.item.visit_sequence.clone().iter() {
                    if plan.pending(room) == 0 {
                        continue;
                    }
                    if bfs_exists(graph, position, room).is_some() {
                        reachable.insert(room);
                    } else {
                        unreachable.insert(room);
                    }
                }
                let lost =
                    plan.truncate_to_unaltered(&reachable, &unreachable, fallback_exit, graph);
                for (room, count) in lost {
                    *affected.entry(room).or_insert(0) += count;
                }
            }

            // Queued future plans: keep the fully intact ones, recycle the
            // rest through the optimizer.
            let mut kept: VecDeque<ItemExecutionPlan> = VecDeque::new();
            let mut first = true;
            for plan in self.queues[i].drain(..) {
                if first {
                    first = false;
                    kept.push_back(plan);
                    continue;
                }
                let path_ok = plan
                    .item
                    .full_path
                    .windows(2)
                    .all(|pair| graph.adjacent(pair[0], pair[1]));
                if path_ok {
                    kept.push_back(plan);
                } else {
                    for (&room, _) in &plan.item.vector {
                        let pending = plan.pending(room);
                        if pending > 0 {
                            *affected.entry(room).or_insert(0) += pending;
                        }
                    }
                }
            }
            self.queues[i] = kept;
        }

        if !affected.is_empty() {
            tracing::info!(
                rooms = affected.len(),
                passengers = affected.values().sum::<u32>(),
                "replan collected affected pickups"
            );
        }
        affected
    }
}
