//! Speculative parallel `for_each` over a dynamically growing worklist.
//!
//! A fixed pool of workers repeatedly takes a work item, opens an
//! [`IterationContext`], and runs the [`Operator`] on it:
//!
//! - `Ok(())` commits: ownership is released, then discovered work scheduled;
//! - a retryable error ([`RefineError::is_retryable`]) aborts: ownership is
//!   released, discoveries dropped, and the item goes back to the pool;
//! - any other error is fatal: the pool is halted and the first fatal error
//!   is returned once every worker has stopped;
//! - a panic in the operator halts the pool the same way and is resumed on
//!   the calling thread once every worker has stopped.
//!
//! [`for_each`] returns only at quiescence, so no partial result is visible to
//! the caller while workers are running.

use crate::refine_error::RefineError;
use crate::runtime::context::IterationContext;
use crate::runtime::graph::Graph;
use crate::runtime::node::{IterationId, NodeId};
use crate::runtime::worklist::Worklist;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Algorithm body run once per work item.
pub trait Operator<N>: Sync {
    /// Worker-local scratch, reused across iterations.
    type Scratch: Send;

    fn scratch(&self) -> Self::Scratch;

    /// Processes `item`. Must be cautious: no graph mutation before
    /// [`IterationContext::cautious_point`].
    fn apply(
        &self,
        item: NodeId,
        scratch: &mut Self::Scratch,
        cx: &mut IterationContext<'_, N>,
    ) -> Result<(), RefineError>;
}

/// Runtime knobs for [`for_each`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker count; `0` uses the size of rayon's global pool.
    pub threads: usize,
    /// Stop with [`RefineError::IterationLimit`] after this many commits.
    pub iteration_limit: Option<u64>,
}

impl ExecutorConfig {
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    pub fn resolved_threads(&self) -> usize {
        match self.threads {
            0 => rayon::current_num_threads().max(1),
            n => n,
        }
    }
}

/// Counters collected over one [`for_each`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub commits: u64,
    pub aborts: u64,
    /// Work items scheduled by commits.
    pub pushes: u64,
    pub threads: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct Counters {
    next_iteration: AtomicU64,
    commits: AtomicU64,
    aborts: AtomicU64,
    pushes: AtomicU64,
}

impl Counters {
    fn next_id(&self) -> IterationId {
        IterationId::new(self.next_iteration.fetch_add(1, Ordering::Relaxed))
    }
}

struct Shared<'a, N, O> {
    graph: &'a Graph<N>,
    op: &'a O,
    worklist: Worklist<NodeId>,
    counters: Counters,
    fatal: OnceCell<RefineError>,
    limit: Option<u64>,
}

impl<N, O: Operator<N>> Shared<'_, N, O> {
    fn fail(&self, err: RefineError) {
        log::debug!("halting run: {err}");
        // Only the first fatal error is reported.
        let _ = self.fatal.set(err);
        self.worklist.halt();
    }

    fn work(&self) {
        let mut cx = IterationContext::new(self.graph, self.counters.next_id());
        let mut scratch = self.op.scratch();
        let mut first = true;
        while let Some(item) = self.worklist.take() {
            if !first {
                cx.begin(self.counters.next_id());
            }
            first = false;

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| self.op.apply(item, &mut scratch, &mut cx)));
            let result = match outcome {
                Ok(result) => result,
                Err(payload) => {
                    log::debug!("{} panicked on item {item}, halting run", cx.id());
                    cx.abort();
                    self.worklist.halt();
                    self.worklist.finish([]);
                    panic::resume_unwind(payload);
                }
            };

            match result {
                Ok(()) => {
                    let mut scheduled = 0;
                    cx.commit(|found| {
                        scheduled = found.len() as u64;
                        self.worklist.finish(found.drain(..));
                    });
                    self.counters.pushes.fetch_add(scheduled, Ordering::Relaxed);
                    let commits = self.counters.commits.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(limit) = self.limit {
                        let pending = !self.worklist.is_empty() || self.worklist.in_flight() > 0;
                        if commits >= limit && pending {
                            self.fail(RefineError::IterationLimit { limit });
                        }
                    }
                }
                Err(err) if err.is_retryable() => {
                    log::trace!("{} aborted on item {item}: {err}", cx.id());
                    cx.abort();
                    self.counters.aborts.fetch_add(1, Ordering::Relaxed);
                    self.worklist.finish([item]);
                    std::thread::yield_now();
                }
                Err(err) => {
                    cx.abort();
                    self.fail(err);
                    self.worklist.finish([]);
                }
            }
        }
    }
}

/// Runs `op` over `initial` and everything it discovers until quiescence.
pub fn for_each<N, O, I>(
    graph: &Graph<N>,
    initial: I,
    op: &O,
    cfg: &ExecutorConfig,
) -> Result<RunStats, RefineError>
where
    N: Send + Sync,
    O: Operator<N>,
    I: IntoIterator<Item = NodeId>,
{
    let threads = cfg.resolved_threads();
    let shared = Shared {
        graph,
        op,
        worklist: Worklist::new(),
        counters: Counters::default(),
        fatal: OnceCell::new(),
        limit: cfg.iteration_limit,
    };
    shared.worklist.extend(initial);
    log::debug!(
        "for_each: {} seed items on {threads} worker(s)",
        shared.worklist.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("amorph-worker-{i}"))
        .build()
        .map_err(|e| RefineError::ThreadPool(e.to_string()))?;

    let started = Instant::now();
    pool.scope(|s| {
        for _ in 0..threads {
            s.spawn(|_| shared.work());
        }
    });

    let stats = RunStats {
        commits: shared.counters.commits.load(Ordering::Relaxed),
        aborts: shared.counters.aborts.load(Ordering::Relaxed),
        pushes: shared.counters.pushes.load(Ordering::Relaxed),
        threads,
        elapsed: started.elapsed(),
    };

    if let Some(err) = shared.fatal.into_inner() {
        return Err(err);
    }
    debug_assert_eq!(graph.locks().owned_count(), 0, "ownership leaked past quiescence");
    log::info!(
        "for_each: {} commits, {} aborts, {} pushes in {:?}",
        stats.commits,
        stats.aborts,
        stats.pushes,
        stats.elapsed
    );
    Ok(stats)
}
