//! File writers for the two artifact kinds.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::Writer;

use crate::row::{TickTraceRow, TrialSummary};
use crate::OutputResult;

// ── CSV tick trace ────────────────────────────────────────────────────────────

/// Writes one run's per-tick timeline to `tick_trace.csv` in `dir`.
pub struct CsvTraceWriter {
    trace: Writer<File>,
    finished: bool,
}

impl CsvTraceWriter {
    /// Open (or create) the trace file in `dir` and write the header row.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let mut trace = Writer::from_path(dir.join("tick_trace.csv"))?;
        trace.write_record(["tick", "phase", "rescued", "dead", "remaining", "edges_existing"])?;
        Ok(Self {
            trace,
            finished: false,
        })
    }

    pub fn write_tick(&mut self, row: &TickTraceRow) -> OutputResult<()> {
        self.trace.write_record(&[
            row.tick.to_string(),
            row.phase.clone(),
            row.rescued.to_string(),
            row.dead.to_string(),
            row.remaining.to_string(),
            row.edges_existing.to_string(),
        ])?;
        Ok(())
    }

    /// Flush the underlying file.  Idempotent.
    pub fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.trace.flush()?;
        Ok(())
    }
}

// ── JSON trial summaries ──────────────────────────────────────────────────────

/// Accumulates [`TrialSummary`] records and writes them as one JSON array.
///
/// Buffered by design: a benchmark sweep appends trials as they complete
/// (possibly out of order from parallel workers) and the array is written
/// once at [`finish`](Self::finish).
pub struct JsonTrialWriter {
    path: PathBuf,
    trials: Vec<TrialSummary>,
    finished: bool,
}

impl JsonTrialWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            trials: Vec::new(),
            finished: false,
        }
    }

    pub fn push(&mut self, trial: TrialSummary) {
        self.trials.push(trial);
    }

    pub fn extend(&mut self, trials: impl IntoIterator<Item = TrialSummary>) {
        self.trials.extend(trials);
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Sort trials by seed (stable across parallel execution orders) and
    /// write the JSON array.  Idempotent.
    pub fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.trials.sort_by_key(|t| t.seed);
        let mut file = File::create(&self.path)?;
        serde_json::to_writer_pretty(&mut file, &self.trials)?;
        file.write_all(b"\n")?;
        Ok(())
    }
}
