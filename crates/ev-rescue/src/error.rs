//! Rescue-subsystem error type.
//!
//! Only the assignment hand-off can fail; the optimizer and the per-tick
//! dispatch path recover from everything locally (budget degradation,
//! deferral, truncation).

use thiserror::Error;

/// Errors produced by `ev-rescue`.
#[derive(Debug, Error)]
pub enum RescueError {
    #[error("assignment has {got} queues for {expected} responders")]
    QueueCountMismatch { expected: usize, got: usize },
}

pub type RescueResult<T> = Result<T, RescueError>;
