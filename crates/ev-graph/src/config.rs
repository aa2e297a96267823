//! JSON building-config records and graph construction.
//!
//! # Document shape
//!
//! ```json
//! {
//!   "vertices": [
//!     { "id": "r1", "kind": "room", "floor": 0, "capacity": 8, "priority": 1.0,
//!       "sweep_time": 2, "area_m2": 20.0, "ceiling_height_m": 2.5,
//!       "visual_position": { "x": 0.0, "y": 4.0 }, "room_type": "office" }
//!   ],
//!   "edges": [
//!     { "id": "e1", "vertex_a": "r1", "vertex_b": "h1",
//!       "max_flow": 4, "width_m": 1.2, "base_burn_rate": 0.001 }
//!   ],
//!   "occupancy_probabilities": [
//!     { "vertex_id": "r1", "capable": [0.2, 0.5, 0.3], "incapable": [0.8, 0.2] }
//!   ],
//!   "fire_params": { "origin_vertex_id": "r1", "initial_smoke_level": 0.0 },
//!   "building_params": { "num_floors": 2, "floor_height_m": 3.0 }
//! }
//! ```
//!
//! Unknown fields are ignored so configs produced by newer authoring tools
//! still load.  String ids in the document are resolved to dense
//! [`VertexId`]s at build time; the kernel and planners only ever see dense
//! ids.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use ev_core::{EvError, VertexId};

use crate::building::{BuildingGraph, BuildingGraphBuilder, Vertex, VertexKind};
use crate::{GraphError, GraphResult};

// ── JSON records ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct VisualPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VertexSpec {
    pub id: String,
    pub kind: VertexKind,
    #[serde(default)]
    pub floor: i16,
    pub capacity: u32,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default = "default_sweep_time")]
    pub sweep_time: u32,
    pub area_m2: f32,
    pub ceiling_height_m: f32,
    pub visual_position: VisualPosition,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub staircase_group: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeSpec {
    pub id: String,
    pub vertex_a: String,
    pub vertex_b: String,
    pub max_flow: u32,
    pub width_m: f32,
    pub base_burn_rate: f64,
    /// Traversal length in metres; defaults to the 1 m unit hop.  Staircase
    /// edges carry their configured run length here.
    #[serde(default = "default_unit_length")]
    pub unit_length: f32,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Occupancy distribution for one room: `capable[n]` / `incapable[n]` is the
/// weight of sampling exactly `n` occupants of that class.
#[derive(Debug, Clone, Deserialize)]
pub struct OccupancySpec {
    pub vertex_id: String,
    #[serde(default)]
    pub capable: Vec<f64>,
    #[serde(default)]
    pub incapable: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FireParams {
    pub origin_vertex_id: String,
    #[serde(default)]
    pub initial_smoke_level: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingParams {
    pub num_floors: u32,
    pub floor_height_m: f32,
}

/// The full immutable building configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildingConfig {
    pub vertices: Vec<VertexSpec>,
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub occupancy_probabilities: Vec<OccupancySpec>,
    pub fire_params: FireParams,
    #[serde(default)]
    pub building_params: Option<BuildingParams>,
}

fn default_priority() -> f64 {
    1.0
}

fn default_sweep_time() -> u32 {
    1
}

fn default_unit_length() -> f32 {
    1.0
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BuildingConfig {
    /// Load a config from a JSON file.
    pub fn from_path(path: &Path) -> GraphResult<Self> {
        let text = std::fs::read_to_string(path).map_err(EvError::Io)?;
        Self::from_json_str(&text)
    }

    /// Parse a config from a JSON string.
    pub fn from_json_str(text: &str) -> GraphResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| GraphError::Core(EvError::Parse(e.to_string())))
    }

    /// Resolve string ids and build the runtime graph.
    pub fn resolve(&self) -> GraphResult<ResolvedBuilding> {
        // ── Vertex table and name index ───────────────────────────────────
        let mut index: FxHashMap<String, VertexId> = FxHashMap::default();
        let floor_height = self
            .building_params
            .as_ref()
            .map(|p| p.floor_height_m)
            .unwrap_or(crate::building::DEFAULT_FLOOR_HEIGHT_M);

        let mut builder = BuildingGraphBuilder::new().floor_height(floor_height);
        let mut names = Vec::with_capacity(self.vertices.len());

        for spec in &self.vertices {
            if index.contains_key(&spec.id) {
                return Err(GraphError::DuplicateVertex(spec.id.clone()));
            }
            let id = builder.add_vertex_full(Vertex {
                kind: spec.kind,
                floor: spec.floor,
                capacity: spec.capacity,
                priority: spec.priority,
                sweep_time: spec.sweep_time,
                area_m2: spec.area_m2,
                ceiling_m: spec.ceiling_height_m,
                position: (spec.visual_position.x, spec.visual_position.y),
                burned: false,
            });
            index.insert(spec.id.clone(), id);
            names.push(spec.id.clone());
        }

        // ── Edges ─────────────────────────────────────────────────────────
        for spec in &self.edges {
            let a = *index.get(&spec.vertex_a).ok_or_else(|| GraphError::MissingEndpoint {
                edge: spec.id.clone(),
                endpoint: spec.vertex_a.clone(),
            })?;
            let b = *index.get(&spec.vertex_b).ok_or_else(|| GraphError::MissingEndpoint {
                edge: spec.id.clone(),
                endpoint: spec.vertex_b.clone(),
            })?;
            builder.add_edge(a, b, spec.max_flow, spec.width_m, spec.base_burn_rate, spec.unit_length);
        }

        // ── Fire origin and occupancy ─────────────────────────────────────
        let fire_origin = *index
            .get(&self.fire_params.origin_vertex_id)
            .ok_or_else(|| GraphError::UnknownVertex(self.fire_params.origin_vertex_id.clone()))?;

        let mut occupancy: Vec<Option<OccupancyDist>> = vec![None; self.vertices.len()];
        for spec in &self.occupancy_probabilities {
            let v = *index
                .get(&spec.vertex_id)
                .ok_or_else(|| GraphError::UnknownVertex(spec.vertex_id.clone()))?;
            occupancy[v.index()] = Some(OccupancyDist {
                capable: spec.capable.clone(),
                incapable: spec.incapable.clone(),
            });
        }

        tracing::debug!(
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            origin = %fire_origin,
            "resolved building config"
        );

        Ok(ResolvedBuilding {
            graph: builder.build(),
            names,
            index,
            fire_origin,
            initial_smoke_level: self.fire_params.initial_smoke_level,
            occupancy,
        })
    }
}

// ── Resolved output ───────────────────────────────────────────────────────────

/// Weight vectors over occupant counts 0..n for one room.
#[derive(Debug, Clone, Default)]
pub struct OccupancyDist {
    pub capable: Vec<f64>,
    pub incapable: Vec<f64>,
}

/// A config with all string ids resolved to dense arena ids.
#[derive(Debug)]
pub struct ResolvedBuilding {
    pub graph: BuildingGraph,
    /// Dense-id → original string id, for log and report readability.
    pub names: Vec<String>,
    /// Original string id → dense id.
    pub index: FxHashMap<String, VertexId>,
    pub fire_origin: VertexId,
    pub initial_smoke_level: f32,
    /// Per-vertex occupancy distribution; `None` rooms start empty.
    pub occupancy: Vec<Option<OccupancyDist>>,
}
