//! `ev-output` — run artifacts for benchmarks and analysis.
//!
//! Two artifact kinds:
//!
//! - **Trial summaries** — one JSON record per benchmark trial, written as a
//!   JSON array at the end of a sweep ([`JsonTrialWriter`]).
//! - **Tick traces** — one CSV row per tick of a single run, for plotting a
//!   run's timeline ([`CsvTraceWriter`]).
//!
//! [`TrialRecorder`] bridges the kernel to both: feed it every `TickResult`
//! and it accumulates the fields a summary needs.

pub mod error;
pub mod recorder;
pub mod row;
pub mod writer;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{OutputError, OutputResult};
pub use recorder::TrialRecorder;
pub use row::{TickTraceRow, TrialSummary};
pub use writer::{CsvTraceWriter, JsonTrialWriter};
