//! Rescue items and their mutable execution wrappers.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use ev_core::VertexId;
use ev_graph::{bfs_exists, BuildingGraph};

// ── RescueItem ────────────────────────────────────────────────────────────────

/// One candidate pickup plan for a single responder: which rooms, how many
/// from each, in what order, and through which exits.  Immutable once
/// emitted by the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RescueItem {
    /// Room → how many incapable occupants to lift there.  Always
    /// `Σ counts ≤ K` and per-room `count ≤ observed incapable`.
    pub vector: BTreeMap<VertexId, u32>,
    /// Rooms with nonzero count, in planned visit order.
    pub visit_sequence: Vec<VertexId>,
    pub entry_exit: VertexId,
    pub drop_exit: VertexId,
    /// Concrete vertex walk `entry_exit → rooms… → drop_exit`; every edge
    /// existed at generation time.
    pub full_path: Vec<VertexId>,
    /// Carrying-weighted traversal cost in unit hops (loaded legs × 2).
    pub time: f64,
    /// Priority-weighted value density (`V / time`).
    pub value: f64,
}

impl RescueItem {
    /// Total passengers this item lifts.
    pub fn passengers(&self) -> u32 {
        self.vector.values().sum()
    }
}

// ── ItemExecutionPlan ─────────────────────────────────────────────────────────

/// Mutable execution state of one [`RescueItem`] for a specific responder.
#[derive(Debug, Clone)]
pub struct ItemExecutionPlan {
    pub item: RescueItem,
    /// Room → occupants already lifted under this plan.
    pub picked_up: BTreeMap<VertexId, u32>,
    /// Index into `item.full_path` of the responder's expected position.
    pub current_index: usize,
    pub completed: bool,
}

impl ItemExecutionPlan {
    pub fn new(item: RescueItem) -> Self {
        Self {
            item,
            picked_up: BTreeMap::new(),
            current_index: 0,
            completed: false,
        }
    }

    /// Pickups still owed in `room` under this plan.
    pub fn pending(&self, room: VertexId) -> u32 {
        let want = self.item.vector.get(&room).copied().unwrap_or(0);
        let have = self.picked_up.get(&room).copied().unwrap_or(0);
        want.saturating_sub(have)
    }

    /// `true` once every room's pickups are done.
    pub fn all_picked(&self) -> bool {
        self.item
            .vector
            .keys()
            .all(|&room| self.pending(room) == 0)
    }

    /// Total pickups still owed anywhere.
    pub fn total_pending(&self) -> u32 {
        self.item.vector.keys().map(|&r| self.pending(r)).sum()
    }

    /// The vertex this plan believes the responder is at.
    pub fn expected_position(&self) -> VertexId {
        self.item.full_path[self.current_index]
    }

    /// Rewrite the plan after a graph change: keep only the `reachable`
    /// remaining rooms, walk them from the current position, and finish at
    /// `fallback_exit`.  Returns the **affected vector** — pending pickups
    /// in `unreachable` rooms — for the optimizer to re-plan.
    pub fn truncate_to_unaltered(
        &mut self,
        reachable: &FxHashSet<VertexId>,
        unreachable: &FxHashSet<VertexId>,
        fallback_exit: VertexId,
        graph: &BuildingGraph,
    ) -> BTreeMap<VertexId, u32> {
        let position = self.expected_position();

        // Collect what's lost.
        let mut affected: BTreeMap<VertexId, u32> = BTreeMap::new();
        for &room in unreachable {
            let pending = self.pending(room);
            if pending > 0 {
                affected.insert(room, pending);
            }
        }

        // Remaining stops, original order, reachable only.
        let keep: Vec<VertexId> = self
            .item
            .visit_sequence
            .iter()
            .copied()
            .filter(|room| self.pending(*room) > 0 && reachable.contains(room))
            .collect();

        // Drop lost rooms from the vector (down to what was already lifted).
        for (&room, &pending) in &affected {
            let lifted = self.picked_up.get(&room).copied().unwrap_or(0);
            debug_assert!(self.item.vector.get(&room).copied().unwrap_or(0) >= pending);
            if lifted == 0 {
                self.item.vector.remove(&room);
            } else {
                self.item.vector.insert(room, lifted);
            }
        }
        let kept_rooms: FxHashSet<VertexId> = self.item.vector.keys().copied().collect();
        self.item.visit_sequence.retain(|room| kept_rooms.contains(room));

        // Re-thread the concrete walk: position → kept rooms → fallback.
        let mut path = vec![position];
        let mut cursor = position;
        for &stop in keep.iter().chain(std::iter::once(&fallback_exit)) {
            match bfs_exists(graph, cursor, stop) {
                Some(leg) => {
                    path.extend_from_slice(&leg[1..]);
                    cursor = stop;
                }
                None => {
                    // A "reachable" stop the caller misjudged; treat it as
                    // lost too rather than emit an untraversable path.
                    let pending = self.pending(stop);
                    if pending > 0 {
                        *affected.entry(stop).or_insert(0) += pending;
                        let lifted = self.picked_up.get(&stop).copied().unwrap_or(0);
                        if lifted == 0 {
                            self.item.vector.remove(&stop);
                        } else {
                            self.item.vector.insert(stop, lifted);
                        }
                        self.item.visit_sequence.retain(|r| *r != stop);
                    }
                }
            }
        }

        self.item.full_path = path;
        self.item.drop_exit = fallback_exit;
        self.current_index = 0;
        if self.item.full_path.len() == 1 && self.all_picked() {
            // Nothing left to do and nowhere to go.
            self.completed = true;
        }

        affected
    }
}
