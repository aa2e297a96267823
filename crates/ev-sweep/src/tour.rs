//! Per-cluster tour construction: complete graph → Prim MST → DFS-doubling
//! route.
//!
//! The route length is bounded by twice the MST weight — good enough for a
//! coverage tour, with none of TSP's pain.

use rustc_hash::FxHashMap;

use ev_core::VertexId;
use ev_graph::{bfs_exists, bfs_hops, BuildingGraph, UNREACHABLE};

/// A planned coverage tour for one responder.
#[derive(Debug, Clone)]
pub struct Tour {
    /// Rooms in planned visit order (MST preorder from the start vertex).
    pub stops: Vec<VertexId>,
    /// Concrete vertex walk: start → every stop → back to start.
    pub path: Vec<VertexId>,
    /// Rooms from the cluster that were unreachable at plan time.
    pub skipped: Vec<VertexId>,
    /// Rough duration: walk hops plus per-room sweep time.
    pub estimated_ticks: u64,
}

/// Plan the tour for `start` and its cluster `rooms`.
pub fn plan_tour(graph: &BuildingGraph, start: VertexId, rooms: &[VertexId]) -> Tour {
    // Corridor distances between all tour nodes.
    let mut hops: FxHashMap<VertexId, Vec<u32>> = FxHashMap::default();
    hops.insert(start, bfs_hops(graph, start));
    for &r in rooms {
        hops.entry(r).or_insert_with(|| bfs_hops(graph, r));
    }

    let (nodes, skipped): (Vec<VertexId>, Vec<VertexId>) = rooms
        .iter()
        .copied()
        .partition(|&r| hops[&start][r.index()] != UNREACHABLE);

    if nodes.is_empty() {
        return Tour {
            stops: Vec::new(),
            path: vec![start],
            skipped,
            estimated_ticks: 0,
        };
    }

    // ── Prim MST over the complete graph {start} ∪ nodes ──────────────────
    // children[i] lists MST children of tour-node i; index 0 is `start`.
    let all: Vec<VertexId> = std::iter::once(start).chain(nodes.iter().copied()).collect();
    let m = all.len();
    let dist = |i: usize, j: usize| -> u32 { hops[&all[i]][all[j].index()] };

    let mut in_tree = vec![false; m];
    let mut best_cost = vec![u32::MAX; m];
    let mut best_parent = vec![0usize; m];
    in_tree[0] = true;
    best_cost[0] = 0;
    for j in 1..m {
        best_cost[j] = dist(0, j);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); m];
    for _ in 1..m {
        // Cheapest un-attached node; ties toward lower index for determinism.
        let next = (0..m)
            .filter(|&j| !in_tree[j])
            .min_by_key(|&j| (best_cost[j], j))
            .expect("nodes remain outside the tree");
        in_tree[next] = true;
        children[best_parent[next]].push(next);
        for j in 0..m {
            if !in_tree[j] {
                let d = dist(next, j);
                if d < best_cost[j] {
                    best_cost[j] = d;
                    best_parent[j] = next;
                }
            }
        }
    }

    // ── DFS preorder (iterative, children in insertion order) ─────────────
    let mut order: Vec<usize> = Vec::with_capacity(m);
    let mut stack = vec![0usize];
    while let Some(i) = stack.pop() {
        order.push(i);
        // Reverse push so the first-attached child is walked first.
        for &c in children[i].iter().rev() {
            stack.push(c);
        }
    }
    let stops: Vec<VertexId> = order[1..].iter().map(|&i| all[i]).collect();

    // ── Concatenate concrete legs: start → stops… → start ─────────────────
    let mut path: Vec<VertexId> = vec![start];
    let mut sweep_ticks: u64 = 0;
    let mut cursor = start;
    for &stop in stops.iter().chain(std::iter::once(&start)) {
        if let Some(leg) = bfs_exists(graph, cursor, stop) {
            path.extend_from_slice(&leg[1..]);
            cursor = stop;
        }
        // A missing leg means the graph changed under us; the coordinator
        // repairs segments at dispatch time, so skip silently here.
    }
    for &s in &stops {
        sweep_ticks += graph.vertex(s).sweep_time as u64;
    }

    let estimated_ticks = (path.len() as u64 - 1) + sweep_ticks;
    tracing::debug!(
        start = %start,
        stops = stops.len(),
        walk = path.len() - 1,
        estimated_ticks,
        "planned sweep tour"
    );

    Tour {
        stops,
        path,
        skipped,
        estimated_ticks,
    }
}
