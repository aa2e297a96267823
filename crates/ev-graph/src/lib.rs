//! `ev-graph` — building graph, config loading, and pathfinding.
//!
//! # Data layout
//!
//! The graph is an **arena with indices**: vertices and edges live in flat
//! `Vec`s keyed by dense [`VertexId`]/[`EdgeId`], and adjacency is a
//! per-vertex list of edge ids.  No `Rc` cycles, and the shortest-path
//! routines scan contiguous memory.
//!
//! Occupant counts deliberately do **not** live here — the kernel keeps them
//! in its own tables so a graph clone can be handed to planners without
//! leaking unvisited-room information.
//!
//! | Module       | Contents                                             |
//! |--------------|------------------------------------------------------|
//! | [`building`] | `Vertex`, `Edge`, `BuildingGraph` + builder          |
//! | [`config`]   | `BuildingConfig` JSON records and graph construction |
//! | [`path`]     | BFS, Dijkstra, memoized all-pairs, exit field        |
//! | [`error`]    | `GraphError`, `GraphResult`                          |

pub mod building;
pub mod config;
pub mod error;
pub mod path;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use building::{BuildingGraph, BuildingGraphBuilder, Edge, Vertex, VertexKind};
pub use config::{BuildingConfig, FireParams, OccupancyDist, ResolvedBuilding};
pub use error::{GraphError, GraphResult};
pub use path::{
    bfs_exists, bfs_hops, dijkstra_from, find_exits, nearest_exit, AllPairs, DistanceMap,
    ExitField, UNREACHABLE,
};
