//! Pathfinding and distance services.
//!
//! All routines observe only **existing** edges at call time; callers must
//! re-run them after the kernel clears edges (a replan event).
//!
//! # Cost units
//!
//! Dijkstra costs are integer millimetres internally (f32 metres × 1000,
//! rounded), which keeps the heap `Ord` and the traces deterministic.  Public
//! accessors return metres as `f64`.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::FxHashMap;

use ev_core::{EdgeId, VertexId};

use crate::building::BuildingGraph;

/// Sentinel distance for unreachable vertices in hop fields.
pub const UNREACHABLE: u32 = u32::MAX;

// ── BFS ───────────────────────────────────────────────────────────────────────

/// Shortest unweighted path over existing edges, as a vertex sequence
/// including both endpoints.  Returns `None` if `dst` is unreachable.
pub fn bfs_exists(graph: &BuildingGraph, src: VertexId, dst: VertexId) -> Option<Vec<VertexId>> {
    if src == dst {
        return Some(vec![src]);
    }
    let n = graph.vertex_count();
    let mut prev = vec![VertexId::NONE; n];
    let mut seen = vec![false; n];
    seen[src.index()] = true;

    let mut queue = VecDeque::new();
    queue.push_back(src);

    while let Some(u) = queue.pop_front() {
        for (_, v) in graph.neighbors(u) {
            if seen[v.index()] {
                continue;
            }
            seen[v.index()] = true;
            prev[v.index()] = u;
            if v == dst {
                return Some(walk_back(&prev, src, dst));
            }
            queue.push_back(v);
        }
    }
    None
}

/// Hop count from `src` to every vertex over existing edges.
/// Unreachable vertices get [`UNREACHABLE`].
pub fn bfs_hops(graph: &BuildingGraph, src: VertexId) -> Vec<u32> {
    let n = graph.vertex_count();
    let mut dist = vec![UNREACHABLE; n];
    dist[src.index()] = 0;

    let mut queue = VecDeque::new();
    queue.push_back(src);

    while let Some(u) = queue.pop_front() {
        let du = dist[u.index()];
        for (_, v) in graph.neighbors(u) {
            if dist[v.index()] == UNREACHABLE {
                dist[v.index()] = du + 1;
                queue.push_back(v);
            }
        }
    }
    dist
}

fn walk_back(prev: &[VertexId], src: VertexId, dst: VertexId) -> Vec<VertexId> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        cur = prev[cur.index()];
        path.push(cur);
    }
    path.reverse();
    path
}

// ── Dijkstra ──────────────────────────────────────────────────────────────────

/// Single-source shortest-path tree over existing edges, weighted by edge
/// length.  `dist(src) == Some(0.0)` by construction.
#[derive(Debug, Clone)]
pub struct DistanceMap {
    pub src: VertexId,
    dist_mm: Vec<u32>,
    prev: Vec<VertexId>,
}

impl DistanceMap {
    /// Distance from the source to `v` in metres, or `None` if unreachable.
    pub fn dist(&self, v: VertexId) -> Option<f64> {
        let mm = self.dist_mm[v.index()];
        (mm != UNREACHABLE).then(|| mm as f64 / 1000.0)
    }

    /// `true` if `v` is reachable from the source.
    #[inline]
    pub fn reachable(&self, v: VertexId) -> bool {
        self.dist_mm[v.index()] != UNREACHABLE
    }

    /// The concrete shortest path from the source to `v`, inclusive of both
    /// endpoints.  `None` if unreachable.
    pub fn path_to(&self, v: VertexId) -> Option<Vec<VertexId>> {
        if !self.reachable(v) {
            return None;
        }
        Some(walk_back(&self.prev, self.src, v))
    }
}

/// Edge cost in integer millimetres.
#[inline]
fn edge_cost_mm(graph: &BuildingGraph, e: EdgeId) -> u32 {
    (graph.edge(e).length_m * 1000.0).round() as u32
}

/// Run Dijkstra from `src` over existing edges.
pub fn dijkstra_from(graph: &BuildingGraph, src: VertexId) -> DistanceMap {
    let n = graph.vertex_count();
    let mut dist_mm = vec![UNREACHABLE; n];
    let mut prev = vec![VertexId::NONE; n];
    dist_mm[src.index()] = 0;

    // Min-heap: (cost, vertex). Reverse makes BinaryHeap (max) behave as
    // min-heap; secondary key VertexId gives deterministic tie-breaking.
    let mut heap: BinaryHeap<Reverse<(u32, VertexId)>> = BinaryHeap::new();
    heap.push(Reverse((0, src)));

    while let Some(Reverse((cost, u))) = heap.pop() {
        // Skip stale heap entries.
        if cost > dist_mm[u.index()] {
            continue;
        }
        for (e, v) in graph.neighbors(u) {
            let new_cost = cost.saturating_add(edge_cost_mm(graph, e));
            if new_cost < dist_mm[v.index()] {
                dist_mm[v.index()] = new_cost;
                prev[v.index()] = u;
                heap.push(Reverse((new_cost, v)));
            }
        }
    }

    DistanceMap { src, dist_mm, prev }
}

// ── All-pairs over a vertex set ───────────────────────────────────────────────

/// Memoized Dijkstra trees over a set of sources (rooms ∪ exits).
///
/// The optimizer queries `dist`/`path` many times per item; trees are
/// computed once per source and cached.  Invalidate by dropping the whole
/// structure after a graph change.
#[derive(Default)]
pub struct AllPairs {
    maps: FxHashMap<VertexId, DistanceMap>,
}

impl AllPairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Eagerly compute trees for every vertex in `sources`.
    pub fn over(graph: &BuildingGraph, sources: &[VertexId]) -> Self {
        let mut ap = Self::new();
        for &s in sources {
            ap.ensure(graph, s);
        }
        ap
    }

    /// Compute (or reuse) the tree rooted at `src`.
    pub fn ensure(&mut self, graph: &BuildingGraph, src: VertexId) -> &DistanceMap {
        self.maps.entry(src).or_insert_with(|| dijkstra_from(graph, src))
    }

    /// Distance in metres from `a` to `b`, or `None` if unreachable or `a`
    /// was never ensured.
    pub fn dist(&self, a: VertexId, b: VertexId) -> Option<f64> {
        self.maps.get(&a)?.dist(b)
    }

    /// Concrete path from `a` to `b`.
    pub fn path(&self, a: VertexId, b: VertexId) -> Option<Vec<VertexId>> {
        self.maps.get(&a)?.path_to(b)
    }
}

// ── Exits ─────────────────────────────────────────────────────────────────────

/// All exit-kind vertices in ascending id order.
pub fn find_exits(graph: &BuildingGraph) -> Vec<VertexId> {
    graph
        .vertex_ids()
        .filter(|&v| graph.vertex(v).kind.is_exit())
        .collect()
}

/// Multi-source BFS field from all exits: per-vertex hop distance to the
/// nearest exit and the next hop toward it.
///
/// Drives instructed-occupant egress — each tick an instructed occupant
/// advances one hop along `next_hop`.  Recomputed by the kernel every tick
/// (O(|V|+|E|)) so it always reflects current edge existence.
pub struct ExitField {
    pub dist_hops: Vec<u32>,
    /// One step closer to the nearest exit; `VertexId::NONE` at exits and
    /// unreachable vertices.
    pub next_hop: Vec<VertexId>,
}

impl ExitField {
    pub fn compute(graph: &BuildingGraph) -> Self {
        let n = graph.vertex_count();
        let mut dist_hops = vec![UNREACHABLE; n];
        let mut next_hop = vec![VertexId::NONE; n];

        let mut queue = VecDeque::new();
        for v in find_exits(graph) {
            dist_hops[v.index()] = 0;
            queue.push_back(v);
        }

        while let Some(u) = queue.pop_front() {
            let du = dist_hops[u.index()];
            for (_, v) in graph.neighbors(u) {
                if dist_hops[v.index()] == UNREACHABLE {
                    dist_hops[v.index()] = du + 1;
                    next_hop[v.index()] = u;
                    queue.push_back(v);
                }
            }
        }

        Self { dist_hops, next_hop }
    }

    /// `true` if some exit is reachable from `v`.
    #[inline]
    pub fn exit_reachable(&self, v: VertexId) -> bool {
        self.dist_hops[v.index()] != UNREACHABLE
    }
}

/// The nearest reachable exit from `from` by path length, with its concrete
/// path.  Ties break toward the lower exit id.  `None` if no exit is
/// reachable (a trapped position).
pub fn nearest_exit(graph: &BuildingGraph, from: VertexId) -> Option<(VertexId, Vec<VertexId>)> {
    let tree = dijkstra_from(graph, from);
    let best = find_exits(graph)
        .into_iter()
        .filter_map(|e| tree.dist(e).map(|d| (e, d)))
        .min_by(|(ea, da), (eb, db)| da.partial_cmp(db).unwrap().then(ea.cmp(eb)))?;
    let path = tree.path_to(best.0)?;
    Some((best.0, path))
}
