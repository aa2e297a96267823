//! Sweep-subsystem error type.

use thiserror::Error;

/// Errors produced by `ev-sweep`.  All construction-time; the per-tick
/// dispatch path recovers from everything locally (deferral, re-routing).
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("cannot partition: no responders")]
    NoResponders,
}

pub type SweepResult<T> = Result<T, SweepError>;
