#![cfg_attr(docsrs, feature(doc_cfg))]
//! # amorph-refine
//!
//! amorph-refine is a shared-memory runtime for *amorphous data-parallelism*,
//! where work items and the conflicts between them are discovered only while
//! a shared graph is being rewritten, together with its reference client:
//! Delaunay mesh refinement by cavity re-triangulation.
//!
//! ## Layers
//! - [`runtime`]: concurrent graph store, optimistic per-node ownership,
//!   iteration contexts, the worklist, and the speculative `for_each`
//!   executor.
//! - [`geometry`]: points, triangles, segments, and the predicates refinement
//!   needs (circumcentre, in-circle, obtuse and bad angles).
//! - [`mesh`]: building element graphs from indexed triangles, simple
//!   generators, and a verifier for quiescent meshes.
//! - [`refine`]: the cavity state machine and the parallel refinement driver.
//!
//! ## Execution model
//! Workers never wait on each other. Every graph access acquires the touched
//! node for the running iteration; if another iteration already owns it the
//! attempt aborts, releases everything, and its work item is retried later.
//! Operators are cautious: all acquisition happens before
//! [`IterationContext::cautious_point`](runtime::context::IterationContext::cautious_point),
//! all mutation after it, so an aborted attempt leaves the graph untouched.
//!
//! ## Determinism
//! Node identities in a refined mesh depend on scheduling. The geometry does
//! not depend on the thread count for meshes whose refinement is confluent,
//! and every run ends with a verified, bad-free mesh covering the same area.
//!
//! ## Logging
//! The crate logs through the [`log`] facade and installs no logger.

pub mod debug_invariants;
pub mod geometry;
pub mod mesh;
pub mod refine;
pub mod refine_error;
pub mod runtime;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::geometry::{Edge, Element, Tuple};
    pub use crate::mesh::{Mesh, MeshSummary, verify};
    pub use crate::refine::{Cavity, RefineConfig, RefineOperator, RefineReport, refine};
    pub use crate::refine_error::RefineError;
    pub use crate::runtime::context::IterationContext;
    pub use crate::runtime::executor::{ExecutorConfig, Operator, RunStats, for_each};
    pub use crate::runtime::graph::{Graph, MethodFlag};
    pub use crate::runtime::node::{IterationId, NodeId};
}
