//! Speculative execution runtime.
//!
//! This module provides the engine that runs an [`Operator`] over a
//! dynamically growing set of work items against a shared [`Graph`]:
//! - `NodeId` / `IterationId` handles
//! - the lock table granting per-node ownership without waiting
//! - the graph store with access-mode tagged operations
//! - per-iteration contexts, the worklist, and the `for_each` driver
//!
//! The runtime knows nothing about meshes; any `Send + Sync` payload works.

pub mod context;
pub mod executor;
pub mod graph;
pub mod lock;
pub mod node;
pub mod worklist;

pub use context::{IterationContext, Phase};
pub use executor::{ExecutorConfig, Operator, RunStats, for_each};
pub use graph::{Graph, MethodFlag};
pub use lock::{LockManager, LockSet};
pub use node::{IterationId, NodeId};
pub use worklist::Worklist;
