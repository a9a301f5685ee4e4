//! Parallel Delaunay refinement.
//!
//! [`refine`] seeds the executor with every bad triangle and runs
//! [`RefineOperator`] to quiescence. Each iteration re-triangulates one
//! [`Cavity`]; new bad triangles are pushed back as they appear.
//!
//! ```rust
//! use amorph_refine::mesh::Mesh;
//! use amorph_refine::refine::{RefineConfig, refine};
//!
//! let mut mesh = Mesh::rectangle(4, 2, 4.0, 0.8)?;
//! let report = refine(&mut mesh, &RefineConfig::with_threads(2))?;
//! assert_eq!(report.after.bad, 0);
//! assert!((report.after.area - report.before.area).abs() < 1e-9);
//! # Ok::<(), amorph_refine::refine_error::RefineError>(())
//! ```

pub mod cavity;

use crate::debug_invariants::DebugInvariants;
use crate::geometry::{Element, MIN_ANGLE};
use crate::mesh::verifier::{MeshSummary, verify_below};
use crate::mesh::{Mesh, bad_elements};
use crate::refine_error::RefineError;
use crate::runtime::context::IterationContext;
use crate::runtime::executor::{ExecutorConfig, Operator, RunStats, for_each};
use crate::runtime::graph::MethodFlag;
use crate::runtime::node::NodeId;
use serde::{Deserialize, Serialize};

pub use cavity::{Cavity, CavityState};

/// Configuration for [`refine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Worker count; `0` uses rayon's default.
    pub threads: usize,
    /// Triangles with an angle below this (degrees) are refined.
    pub min_angle_deg: f64,
    /// Maximum obtuse-chasing steps per cavity.
    pub chase_limit: usize,
    /// Commit budget; `None` runs to quiescence.
    pub iteration_limit: Option<u64>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            min_angle_deg: MIN_ANGLE,
            chase_limit: 4096,
            iteration_limit: None,
        }
    }
}

impl RefineConfig {
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            threads: self.threads,
            iteration_limit: self.iteration_limit,
        }
    }
}

/// Outcome of a [`refine`] run.
#[derive(Debug, Clone, Copy)]
pub struct RefineReport {
    /// Bad triangles the run was seeded with.
    pub initial_bad: usize,
    pub stats: RunStats,
    pub before: MeshSummary,
    pub after: MeshSummary,
}

/// One cavity re-triangulation per work item.
#[derive(Debug, Clone)]
pub struct RefineOperator {
    min_angle: f64,
    chase_limit: usize,
}

impl RefineOperator {
    pub fn new(cfg: &RefineConfig) -> Self {
        Self {
            min_angle: cfg.min_angle_deg,
            chase_limit: cfg.chase_limit,
        }
    }

    fn run(&self, item: NodeId, cavity: &mut Cavity, cx: &mut IterationContext<'_, Element>) -> Result<(), RefineError> {
        // Consumed by an earlier cavity.
        if !cx.contains_node(item, MethodFlag::Write)? {
            return Ok(());
        }
        cavity.initialize(item, cx)?;
        cavity.build(cx)?;
        cavity.compute_post(cx)?;
        cx.cautious_point();
        cavity.update(item, cx)
    }
}

impl Operator<Element> for RefineOperator {
    type Scratch = Cavity;

    fn scratch(&self) -> Cavity {
        Cavity::new(self.min_angle, self.chase_limit)
    }

    fn apply(&self, item: NodeId, cavity: &mut Cavity, cx: &mut IterationContext<'_, Element>) -> Result<(), RefineError> {
        let result = self.run(item, cavity, cx);
        if result.is_err() {
            cavity.mark_aborted();
        }
        result
    }
}

/// Refines `mesh` until no triangle has an angle below `cfg.min_angle_deg`.
///
/// The mesh is verified before and after the run.
///
/// # Errors
/// Any fatal error of the run, or a verification failure of the input.
/// Conflicts between iterations are resolved internally and never surface.
pub fn refine(mesh: &mut Mesh, cfg: &RefineConfig) -> Result<RefineReport, RefineError> {
    let graph = mesh.graph();
    let before = verify_below(graph, cfg.min_angle_deg)?;
    let seeds = bad_elements(graph, cfg.min_angle_deg);
    let initial_bad = seeds.len();

    let stats = for_each(graph, seeds, &RefineOperator::new(cfg), &cfg.executor())?;
    graph.debug_assert_invariants();

    let after = verify_below(graph, cfg.min_angle_deg)?;
    if after.bad > 0 {
        log::warn!("{} bad triangle(s) survived refinement", after.bad);
    }
    log::info!(
        "refined {initial_bad} bad triangle(s): {} -> {} triangles, {} commits, {} aborts",
        before.triangles,
        after.triangles,
        stats.commits,
        stats.aborts
    );
    Ok(RefineReport {
        initial_bad,
        stats,
        before,
        after,
    })
}
