//! k-medoids partitioning over corridor distances.
//!
//! Distances are BFS hop counts over the graph as it exists at partition
//! time — Euclidean distance would tunnel through walls, so it is
//! deliberately not used.  Medoids are seeded at the responders' starting
//! positions and refined with PAM-style swap iterations, bounded at
//! [`MAX_ITERATIONS`].

use rustc_hash::FxHashMap;

use ev_core::{SimRng, VertexId};
use ev_graph::{bfs_hops, BuildingGraph, UNREACHABLE};

use crate::{SweepError, SweepResult};

/// PAM swap iteration bound.
pub const MAX_ITERATIONS: usize = 20;

/// The result of partitioning rooms across responders.
#[derive(Debug)]
pub struct Clustering {
    /// One room list per responder, parallel to the `starts` argument.
    pub clusters: Vec<Vec<VertexId>>,
    /// Final medoid of each cluster.
    pub medoids: Vec<VertexId>,
    /// Rooms unreachable from every start; left out of all clusters.
    pub unreachable: Vec<VertexId>,
}

/// Partition `rooms` into one cluster per entry of `starts`.
///
/// `rng` is used only to break exact ties among equally good medoid
/// candidates, so runs are reproducible for a fixed sweep seed.
pub fn partition_rooms(
    graph: &BuildingGraph,
    rooms: &[VertexId],
    starts: &[VertexId],
    rng: &mut SimRng,
) -> SweepResult<Clustering> {
    if starts.is_empty() {
        return Err(SweepError::NoResponders);
    }

    // Hop fields from every room and every start; the pairwise corridor
    // distance table is read out of these.
    let mut hops: FxHashMap<VertexId, Vec<u32>> = FxHashMap::default();
    for &v in rooms.iter().chain(starts.iter()) {
        hops.entry(v).or_insert_with(|| bfs_hops(graph, v));
    }
    let dist = |a: VertexId, b: VertexId| -> u32 { hops[&a][b.index()] };

    // Rooms nobody can reach can't be toured; report them separately.
    let (reachable, unreachable): (Vec<VertexId>, Vec<VertexId>) = rooms
        .iter()
        .copied()
        .partition(|&r| starts.iter().any(|&s| dist(s, r) != UNREACHABLE));

    let k = starts.len();
    let mut medoids: Vec<VertexId> = starts.to_vec();
    let mut clusters: Vec<Vec<VertexId>> = assign(&reachable, &medoids, &dist);

    // ── PAM swap iterations ───────────────────────────────────────────────
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for c in 0..k {
            if clusters[c].is_empty() {
                continue;
            }
            // Candidate medoid: the member minimizing total distance to the
            // cluster.  Ties resolved by the sweep-seeded stream.
            let mut best_cost = u64::MAX;
            let mut best: Vec<VertexId> = Vec::new();
            for &candidate in &clusters[c] {
                let cost: u64 = clusters[c]
                    .iter()
                    .map(|&m| dist(candidate, m) as u64)
                    .sum();
                if cost < best_cost {
                    best_cost = cost;
                    best = vec![candidate];
                } else if cost == best_cost {
                    best.push(candidate);
                }
            }
            if let Some(&new_medoid) = rng.choose(&best) {
                if new_medoid != medoids[c] {
                    medoids[c] = new_medoid;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
        let reassigned = assign(&reachable, &medoids, &dist);
        if reassigned == clusters {
            break;
        }
        clusters = reassigned;
    }

    rebalance(&mut clusters, &medoids, &dist);

    tracing::debug!(
        rooms = rooms.len(),
        unreachable = unreachable.len(),
        sizes = ?clusters.iter().map(Vec::len).collect::<Vec<_>>(),
        "partitioned sweep clusters"
    );

    Ok(Clustering {
        clusters,
        medoids,
        unreachable,
    })
}

/// Assign each room to its nearest medoid (ties → lower cluster index).
fn assign(
    rooms: &[VertexId],
    medoids: &[VertexId],
    dist: &impl Fn(VertexId, VertexId) -> u32,
) -> Vec<Vec<VertexId>> {
    let mut clusters = vec![Vec::new(); medoids.len()];
    for &room in rooms {
        let mut best = 0;
        let mut best_d = u32::MAX;
        for (c, &m) in medoids.iter().enumerate() {
            // Distance measured from the room's own hop field so it is
            // valid even when the medoid is a start vertex.
            let d = dist(room, m);
            if d < best_d {
                best_d = d;
                best = c;
            }
        }
        clusters[best].push(room);
    }
    clusters
}

/// Enforce the balance constraint: sizes within `⌊N/R⌋−1 ..= ⌈N/R⌉+1`,
/// moving boundary rooms from oversized to undersized clusters.
fn rebalance(
    clusters: &mut [Vec<VertexId>],
    medoids: &[VertexId],
    dist: &impl Fn(VertexId, VertexId) -> u32,
) {
    let n: usize = clusters.iter().map(Vec::len).sum();
    let r = clusters.len();
    if r <= 1 || n == 0 {
        return;
    }
    let lo = (n / r).saturating_sub(1);
    let hi = n.div_ceil(r) + 1;

    // Bounded: each pass moves one room; at most N moves are ever useful.
    for _ in 0..n {
        let Some(over) = clusters.iter().position(|c| c.len() > hi) else {
            break;
        };
        let Some(under) = (0..r).filter(|&c| clusters[c].len() < lo).min_by_key(|&c| {
            // Receiving cluster whose medoid is closest to the donor's rooms.
            clusters[over]
                .iter()
                .map(|&room| dist(room, medoids[c]) as u64)
                .min()
                .unwrap_or(u64::MAX)
        }) else {
            break;
        };
        // Boundary room: the donor room nearest the receiving medoid.
        let (idx, _) = clusters[over]
            .iter()
            .enumerate()
            .min_by_key(|&(_, &room)| (dist(room, medoids[under]), room))
            .expect("oversized cluster is non-empty");
        let room = clusters[over].remove(idx);
        clusters[under].push(room);
    }
}
