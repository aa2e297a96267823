//! Fire and smoke physics formulas.
//!
//! Pure functions over the graph and the kernel's intensity/smoke tables;
//! all state mutation stays in the tick loop (`sim.rs`).  Every rate here is
//! per second and gets scaled by τ ([`TICK_SECS`]) at the call site.

use ev_core::{EdgeId, VertexId, TICK_SECS};
use ev_graph::BuildingGraph;

// ── Tuning constants ──────────────────────────────────────────────────────────

/// Fire intensity at which a vertex ignites (becomes `burned`).
pub const IGNITION_THRESHOLD: f64 = 0.8;

/// Per-second preheating coefficient k in the neighbor-intensity sum.
pub const PREHEAT_COEFF: f64 = 0.05;

/// Intensity transfer modifier across floors.
pub const VERTICAL_PREHEAT_MOD: f64 = 0.7;

/// m³ of smoke generated per second by a room at full fire intensity.
pub const SMOKE_GEN_RATE: f32 = 5.0;

/// Per-second smoke exchange coefficient across an edge.
pub const SMOKE_EXCHANGE_COEFF: f32 = 0.25;

/// Smoke flow modifier when flowing to a higher floor (buoyancy).
pub const SMOKE_UP_MOD: f32 = 1.5;

/// Smoke flow modifier when flowing to a lower floor.
pub const SMOKE_DOWN_MOD: f32 = 0.5;

// ── Edge burn-out ─────────────────────────────────────────────────────────────

/// Per-tick probability that edge `e` burns out.
///
///   p = base · (1 + t/100) · 1/(1 + d/10) · 2/max(0.5, width) · τ
///
/// where `t` is elapsed seconds and `d` the 3-D distance from the edge
/// midpoint to the fire origin.
pub fn edge_burn_probability(
    graph: &BuildingGraph,
    e: EdgeId,
    origin: VertexId,
    elapsed_secs: f64,
) -> f64 {
    let edge = graph.edge(e);
    let d = graph.edge_midpoint_distance(e, origin) as f64;
    let time_factor = 1.0 + elapsed_secs / 100.0;
    let distance_factor = 1.0 / (1.0 + d / 10.0);
    let width_factor = 2.0 / f64::max(0.5, edge.width_m as f64);
    (edge.base_burn_rate * time_factor * distance_factor * width_factor * TICK_SECS)
        .clamp(0.0, 1.0)
}

// ── Preheating ────────────────────────────────────────────────────────────────

/// Per-tick fire-intensity gain at `v` from its neighbors' intensities.
///
/// Preheating conducts through openings whether or not the edge still
/// exists — a burned-out doorway radiates more, not less — so this sums over
/// all incident edges, unlike smoke diffusion which needs an open passage.
pub fn preheat_delta(
    graph: &BuildingGraph,
    intensity: &[f64],
    v: VertexId,
) -> f64 {
    let vert = graph.vertex(v);
    let mut delta = 0.0;
    for &e in graph.incident_edges(v) {
        let edge = graph.edge(e);
        let n = edge.other_end(v);
        let i_n = intensity[n.index()];
        if i_n <= 0.0 {
            continue;
        }
        let width_factor = (edge.width_m as f64).min(2.0);
        let distance_factor = 1.0 / (1.0 + edge.length_m as f64);
        let vertical_modifier = if graph.vertex(n).floor != vert.floor {
            VERTICAL_PREHEAT_MOD
        } else {
            1.0
        };
        delta += i_n * PREHEAT_COEFF * width_factor * distance_factor * vertical_modifier;
    }
    delta * TICK_SECS
}

// ── Smoke ─────────────────────────────────────────────────────────────────────

/// Smoke volume transferred across edge `e` this tick, as
/// `(donor, receiver, m³)`.  Zero-flow edges return `None`.
///
/// Flow follows the concentration differential, scaled by the smaller room
/// volume, with a buoyancy modifier for vertical movement.  The caller clamps
/// against the donor's remaining smoke and the receiver's headroom.
pub fn smoke_transfer(
    graph: &BuildingGraph,
    smoke: &[f32],
    e: EdgeId,
) -> Option<(VertexId, VertexId, f32)> {
    let edge = graph.edge(e);
    if !edge.exists {
        return None;
    }
    let (a, b) = (edge.a, edge.b);
    let vol_a = graph.vertex(a).volume_m3();
    let vol_b = graph.vertex(b).volume_m3();
    if vol_a <= 0.0 || vol_b <= 0.0 {
        return None;
    }
    let conc_a = smoke[a.index()] / vol_a;
    let conc_b = smoke[b.index()] / vol_b;

    let (from, to, diff) = if conc_a > conc_b {
        (a, b, conc_a - conc_b)
    } else if conc_b > conc_a {
        (b, a, conc_b - conc_a)
    } else {
        return None;
    };

    let floor_from = graph.vertex(from).floor;
    let floor_to = graph.vertex(to).floor;
    let vertical_modifier = if floor_to > floor_from {
        SMOKE_UP_MOD
    } else if floor_to < floor_from {
        SMOKE_DOWN_MOD
    } else {
        1.0
    };

    let amount =
        SMOKE_EXCHANGE_COEFF * diff * vol_a.min(vol_b) * vertical_modifier * TICK_SECS as f32;
    (amount > 0.0).then_some((from, to, amount))
}

/// Per-person per-tick death probability at smoke concentration `c`
/// (fraction of room volume).
pub fn smoke_death_probability(c: f32) -> f64 {
    match c {
        c if c < 0.3 => 0.0,
        c if c < 0.5 => 0.02,
        c if c < 0.7 => 0.05,
        _ => 0.15,
    }
}
