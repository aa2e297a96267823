//! Building graph representation and builder.
//!
//! # Mutability contract
//!
//! Identity fields (`kind`, `floor`, endpoints, widths, …) never change after
//! `build()`.  The only runtime mutations are the two sticky transitions the
//! kernel applies: [`BuildingGraph::clear_edge`] (an edge burns out and stops
//! existing) and [`BuildingGraph::mark_burned`] (a vertex ignites).  Neither
//! transition is ever reversed.

use ev_core::{EdgeId, VertexId};

// ── VertexKind ────────────────────────────────────────────────────────────────

/// Structural role of a vertex.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    Room,
    Hallway,
    Intersection,
    Stairwell,
    Exit,
    WindowExit,
}

impl VertexKind {
    /// `true` for both ground exits and window exits — anywhere a drop-off
    /// or autonomous egress completes.
    #[inline]
    pub fn is_exit(self) -> bool {
        matches!(self, VertexKind::Exit | VertexKind::WindowExit)
    }

    /// `true` for the rooms-of-interest a sweep must cover.
    #[inline]
    pub fn is_room(self) -> bool {
        matches!(self, VertexKind::Room)
    }
}

// ── Vertex ────────────────────────────────────────────────────────────────────

/// One vertex of the building graph.
///
/// Occupants are tracked by the kernel, not here; `burned` is the only
/// runtime-mutable field.
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub kind: VertexKind,
    /// Floor number (0-based; vertical separation costs `floor_height_m` per floor).
    pub floor: i16,
    /// Maximum occupants the vertex can hold.
    pub capacity: u32,
    /// Rescue priority weight of occupants found here.
    pub priority: f64,
    /// Ticks a responder budget-estimates for checking this room during sweep.
    pub sweep_time: u32,
    pub area_m2: f32,
    pub ceiling_m: f32,
    /// 2-D visual position (metres) used for fire-distance geometry.
    pub position: (f32, f32),
    /// Sticky: once true, the vertex stays burned and holds no occupants.
    pub burned: bool,
}

impl Vertex {
    /// Gas volume of the vertex in m³ — the smoke concentration denominator.
    #[inline]
    pub fn volume_m3(&self) -> f32 {
        self.area_m2 * self.ceiling_m
    }
}

// ── Edge ──────────────────────────────────────────────────────────────────────

/// One undirected edge of the building graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub a: VertexId,
    pub b: VertexId,
    /// Occupant-traversals permitted per tick.
    pub max_flow: u32,
    pub width_m: f32,
    /// Per-second burn-out probability scale factor.
    pub base_burn_rate: f64,
    /// Physical length in metres (1 m unit hop unless configured otherwise).
    pub length_m: f32,
    /// Sticky: once false, the edge never re-appears and is never traversed.
    pub exists: bool,
}

impl Edge {
    /// The endpoint opposite `v`.
    ///
    /// # Panics
    /// Debug-asserts that `v` is one of the endpoints.
    #[inline]
    pub fn other_end(&self, v: VertexId) -> VertexId {
        debug_assert!(v == self.a || v == self.b);
        if v == self.a { self.b } else { self.a }
    }
}

// ── BuildingGraph ─────────────────────────────────────────────────────────────

/// The building graph arena.
///
/// Cloneable by design: the kernel clones it into each fog-of-war snapshot,
/// so planners can run pathfinding without borrowing kernel state.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    /// Per-vertex incident edge ids (existing and cleared alike).
    adjacency: Vec<Vec<EdgeId>>,
    /// Vertical distance between adjacent floors, metres.
    pub floor_height_m: f32,
}

impl BuildingGraph {
    // ── Dimensions ────────────────────────────────────────────────────────

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ── Element access ────────────────────────────────────────────────────

    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    /// Iterator over all vertex ids in ascending order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len() as u32).map(VertexId)
    }

    /// Iterator over all edge ids in ascending order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len() as u32).map(EdgeId)
    }

    // ── Traversal ─────────────────────────────────────────────────────────

    /// All incident edge ids of `v`, existing or not.
    #[inline]
    pub fn incident_edges(&self, v: VertexId) -> &[EdgeId] {
        &self.adjacency[v.index()]
    }

    /// Iterator over `(edge, neighbor)` pairs reachable from `v` through
    /// **existing** edges only.
    pub fn neighbors(&self, v: VertexId) -> impl Iterator<Item = (EdgeId, VertexId)> + '_ {
        self.adjacency[v.index()].iter().filter_map(move |&e| {
            let edge = &self.edges[e.index()];
            edge.exists.then(|| (e, edge.other_end(v)))
        })
    }

    /// The existing edge joining `a` and `b`, if any.
    pub fn edge_between(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.adjacency[a.index()].iter().copied().find(|&e| {
            let edge = &self.edges[e.index()];
            edge.exists && edge.other_end(a) == b
        })
    }

    /// `true` if `a` and `b` are joined by an existing edge.
    #[inline]
    pub fn adjacent(&self, a: VertexId, b: VertexId) -> bool {
        self.edge_between(a, b).is_some()
    }

    // ── Sticky mutations (kernel only) ────────────────────────────────────

    /// Remove `e` from the traversable graph.  Idempotent.
    pub fn clear_edge(&mut self, e: EdgeId) {
        self.edges[e.index()].exists = false;
    }

    /// Mark `v` burned.  Idempotent.
    pub fn mark_burned(&mut self, v: VertexId) {
        self.vertices[v.index()].burned = true;
    }

    // ── Geometry ──────────────────────────────────────────────────────────

    /// 3-D Euclidean distance between two vertices, with vertical separation
    /// counting `floor_height_m` per floor.
    pub fn euclid_3d(&self, a: VertexId, b: VertexId) -> f32 {
        let va = &self.vertices[a.index()];
        let vb = &self.vertices[b.index()];
        let dx = va.position.0 - vb.position.0;
        let dy = va.position.1 - vb.position.1;
        let dz = (va.floor - vb.floor) as f32 * self.floor_height_m;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// 3-D distance from the midpoint of edge `e` to vertex `origin`.
    pub fn edge_midpoint_distance(&self, e: EdgeId, origin: VertexId) -> f32 {
        let edge = &self.edges[e.index()];
        let va = &self.vertices[edge.a.index()];
        let vb = &self.vertices[edge.b.index()];
        let vo = &self.vertices[origin.index()];
        let mx = (va.position.0 + vb.position.0) * 0.5;
        let my = (va.position.1 + vb.position.1) * 0.5;
        let mz = (va.floor + vb.floor) as f32 * 0.5 * self.floor_height_m;
        let dx = mx - vo.position.0;
        let dy = my - vo.position.1;
        let dz = mz - vo.floor as f32 * self.floor_height_m;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ── BuildingGraphBuilder ──────────────────────────────────────────────────────

/// Construct a [`BuildingGraph`] incrementally, then call [`build`](Self::build).
///
/// The builder accepts vertices and edges in any order; `build()` assembles
/// the per-vertex adjacency lists.
///
/// # Example
///
/// ```
/// use ev_graph::{BuildingGraphBuilder, VertexKind};
///
/// let mut b = BuildingGraphBuilder::new();
/// let room = b.add_vertex(VertexKind::Room, 0, (0.0, 0.0));
/// let exit = b.add_vertex(VertexKind::Exit, 0, (5.0, 0.0));
/// b.add_edge(room, exit, 4, 1.2, 0.0, 1.0);
/// let g = b.build();
/// assert_eq!(g.vertex_count(), 2);
/// assert!(g.adjacent(room, exit));
/// ```
pub struct BuildingGraphBuilder {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    floor_height_m: f32,
}

/// Vertical distance between adjacent floors when the config is silent.
pub const DEFAULT_FLOOR_HEIGHT_M: f32 = 3.0;

impl BuildingGraphBuilder {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            floor_height_m: DEFAULT_FLOOR_HEIGHT_M,
        }
    }

    pub fn floor_height(mut self, metres: f32) -> Self {
        self.floor_height_m = metres;
        self
    }

    /// Add a vertex with test-friendly defaults (capacity 10, priority 1,
    /// 20 m² × 2.5 m).  Use [`add_vertex_full`](Self::add_vertex_full) when
    /// loading real configs.
    pub fn add_vertex(&mut self, kind: VertexKind, floor: i16, position: (f32, f32)) -> VertexId {
        self.add_vertex_full(Vertex {
            kind,
            floor,
            capacity: 10,
            priority: 1.0,
            sweep_time: 1,
            area_m2: 20.0,
            ceiling_m: 2.5,
            position,
            burned: false,
        })
    }

    /// Add a fully specified vertex and return its id (sequential from 0).
    pub fn add_vertex_full(&mut self, vertex: Vertex) -> VertexId {
        let id = VertexId::from_index(self.vertices.len());
        self.vertices.push(vertex);
        id
    }

    /// Add an undirected edge and return its id (sequential from 0).
    pub fn add_edge(
        &mut self,
        a: VertexId,
        b: VertexId,
        max_flow: u32,
        width_m: f32,
        base_burn_rate: f64,
        length_m: f32,
    ) -> EdgeId {
        let id = EdgeId::from_index(self.edges.len());
        self.edges.push(Edge {
            a,
            b,
            max_flow,
            width_m,
            base_burn_rate,
            length_m,
            exists: true,
        });
        id
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Consume the builder and assemble adjacency lists.
    pub fn build(self) -> BuildingGraph {
        let mut adjacency = vec![Vec::new(); self.vertices.len()];
        for (i, edge) in self.edges.iter().enumerate() {
            adjacency[edge.a.index()].push(EdgeId(i as u32));
            adjacency[edge.b.index()].push(EdgeId(i as u32));
        }
        BuildingGraph {
            vertices: self.vertices,
            edges: self.edges,
            adjacency,
            floor_height_m: self.floor_height_m,
        }
    }
}

impl Default for BuildingGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
