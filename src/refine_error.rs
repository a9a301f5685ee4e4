//! RefineError: Unified error type for amorph-refine public APIs
//!
//! Two very different classes of failure travel through this one enum.
//! *Conflicts* are the expected, frequent outcome of optimistic locking: the
//! executor aborts the iteration, releases its ownership and re-queues the work
//! item without ever reporting it. Everything else stops the run and is
//! surfaced to the driver. [`RefineError::is_retryable`] draws the line.

use crate::runtime::node::NodeId;
use thiserror::Error;

/// Unified error type for graph, executor and refinement operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefineError {
    /// Attempted to construct a NodeId with a zero value (invalid).
    #[error("NodeId must be non-zero (0 is reserved as invalid/sentinel)")]
    InvalidNodeId,
    /// The node is owned by another in-flight iteration.
    #[error("conflict: node {node} is owned by another iteration")]
    Conflict { node: NodeId },
    /// A speculative reader found the node gone; a concurrent commit removed it.
    #[error("node {0} was removed by a concurrent commit")]
    StaleNode(NodeId),
    /// The node is not part of the graph.
    #[error("node {0} is not present in the graph")]
    MissingNode(NodeId),
    /// A geometric or topological invariant does not hold.
    #[error("invariant violated at node {node}: {reason}")]
    Invariant { node: NodeId, reason: String },
    /// Chasing obtuse elements in `initialize` did not settle.
    #[error("obtuse chain starting at node {node} exceeded {limit} steps")]
    ChaseLimit { node: NodeId, limit: usize },
    /// The executor committed as many iterations as it was allowed to.
    #[error("iteration limit of {limit} commits reached before quiescence")]
    IterationLimit { limit: u64 },
    /// Construction input does not describe a valid triangulation.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    /// The worker pool could not be started.
    #[error("worker pool could not be built: {0}")]
    ThreadPool(String),
}

impl RefineError {
    /// `true` for the failures an iteration recovers from by aborting and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RefineError::Conflict { .. } | RefineError::StaleNode(_))
    }

    pub(crate) fn invariant(node: NodeId, reason: impl Into<String>) -> Self {
        RefineError::Invariant {
            node,
            reason: reason.into(),
        }
    }
}
