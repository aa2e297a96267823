//! Graph-subsystem error type.

use thiserror::Error;

use ev_core::{EvError, VertexId};

/// Errors produced by `ev-graph`.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no path from {from} to {to}")]
    NoPath { from: VertexId, to: VertexId },

    #[error("unknown vertex id {0:?}")]
    UnknownVertex(String),

    #[error("duplicate vertex id {0:?}")]
    DuplicateVertex(String),

    #[error("edge {edge:?} references missing endpoint {endpoint:?}")]
    MissingEndpoint { edge: String, endpoint: String },

    #[error(transparent)]
    Core(#[from] EvError),
}

pub type GraphResult<T> = Result<T, GraphError>;
