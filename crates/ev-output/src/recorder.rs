//! Accumulates kernel tick results into a trial summary.

use ev_sim::{SimEvent, Stats, TickResult};

use crate::row::TrialSummary;

/// Feed every [`TickResult`] of a run to a `TrialRecorder`; it tracks the
/// summary fields the kernel's final [`Stats`] can't provide on its own
/// (currently the last-rescue tick).
#[derive(Debug, Default)]
pub struct TrialRecorder {
    last_rescue_tick: u64,
}

impl TrialRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, result: &TickResult) {
        let rescued_here = result
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::Rescued { .. }));
        if rescued_here {
            self.last_rescue_tick = result.tick.0;
        }
    }

    /// Assemble the summary from the run's final stats.
    pub fn finish(
        self,
        stats: &Stats,
        seed: u64,
        fire_origin: impl Into<String>,
        replan_count: u32,
    ) -> TrialSummary {
        let survival_rate = if stats.total_initial == 0 {
            1.0
        } else {
            stats.rescued as f64 / stats.total_initial as f64
        };
        TrialSummary {
            seed,
            fire_origin: fire_origin.into(),
            rescued: stats.rescued,
            dead: stats.dead,
            total_initial: stats.total_initial,
            survival_rate,
            time_ticks: stats.tick,
            last_rescue_tick: self.last_rescue_tick,
            replan_count,
        }
    }
}
