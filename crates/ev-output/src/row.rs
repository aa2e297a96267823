//! Plain data rows written by the output backends.

use serde::{Deserialize, Serialize};

/// One benchmark trial, summarized.  Serialized into the output JSON array
/// and read back by analysis scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub seed: u64,
    /// Config string id of the fire origin used for this trial.
    pub fire_origin: String,
    pub rescued: u32,
    pub dead: u32,
    pub total_initial: u32,
    /// `rescued / total_initial`; 1.0 for an empty building.
    pub survival_rate: f64,
    pub time_ticks: u64,
    /// Tick of the last rescue event; 0 if nobody was rescued.
    pub last_rescue_tick: u64,
    pub replan_count: u32,
}

/// One tick of a single run's timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickTraceRow {
    pub tick: u64,
    /// Controller phase, `"sweep"` or `"rescue"`.
    pub phase: String,
    pub rescued: u32,
    pub dead: u32,
    pub remaining: u32,
    /// Edges still standing.
    pub edges_existing: usize,
}
