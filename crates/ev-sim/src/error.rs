//! Kernel error type.
//!
//! Only configuration problems are fatal, and they surface at construction.
//! Everything at tick time — rejected actions, invalidated plans — is
//! reported through `TickResult`, never as an `Err`.

use thiserror::Error;

use ev_graph::GraphError;

/// Errors produced by `ev-sim`.  All variants are construction-time.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("building has no exit vertices")]
    NoExits,

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type SimResult<T> = Result<T, SimError>;
