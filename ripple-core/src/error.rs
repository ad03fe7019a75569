//! Error types for the reactive core.
//!
//! Errors are surfaced immediately to the caller. Nothing in the engine
//! retries or recovers from them internally.

use thiserror::Error;

use crate::graph::NodeId;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Everything that can go wrong when building or driving a reactive graph.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A constructor, setter, `on`, or derived computation received an
    /// unexpected number of arguments.
    #[error("{operation} accepts {expected} argument(s), got {actual}")]
    InvalidArity {
        operation: &'static str,
        expected: String,
        actual: usize,
    },

    /// `on` was given something that is not a listener.
    #[error("{operation} only accepts listener functions, not values")]
    InvalidListener { operation: &'static str },

    /// A digest followed an edge back into a node that was still being
    /// visited.
    #[error("cyclic dependency detected at node {node}")]
    CyclicDependency { node: NodeId },

    /// The engine configuration could not be parsed.
    #[error("invalid engine configuration: {0}")]
    Config(#[source] serde_json::Error),

    /// A graph snapshot could not be rendered.
    #[error("failed to serialize graph snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl ReactiveError {
    pub(crate) fn arity(
        operation: &'static str,
        expected: impl Into<String>,
        actual: usize,
    ) -> Self {
        Self::InvalidArity {
            operation,
            expected: expected.into(),
            actual,
        }
    }
}
