//! Per-iteration state handed to an [`Operator`](crate::runtime::executor::Operator).
//!
//! An `IterationContext` bundles the ownership acquired by one attempt, the
//! work items it discovered, and the phase it is in. Workers keep a single
//! context alive for their whole lifetime and re-arm it for every attempt, so
//! the buffers behave like an arena: reset wholesale, never freed one by one.
//!
//! Operators are expected to be *cautious*: every protected read happens
//! before [`IterationContext::cautious_point`], every mutation after it. An
//! abort before that point therefore leaves the graph untouched, and a
//! conflict after it is reported as a fatal invariant violation instead of a
//! silently torn commit.

use crate::refine_error::RefineError;
use crate::runtime::graph::{Graph, MethodFlag};
use crate::runtime::lock::LockSet;
use crate::runtime::node::{IterationId, NodeId};
use std::sync::Arc;

/// Where an iteration stands with respect to its cautious point.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Reads may conflict; nothing has been written.
    Speculative,
    /// Ownership is complete; only unprotected writes follow.
    Committing,
}

/// Scratch state of one iteration attempt.
pub struct IterationContext<'g, N> {
    graph: &'g Graph<N>,
    locks: LockSet,
    discovered: Vec<NodeId>,
    phase: Phase,
}

impl<'g, N> IterationContext<'g, N> {
    pub fn new(graph: &'g Graph<N>, id: IterationId) -> Self {
        Self {
            graph,
            locks: LockSet::new(id),
            discovered: Vec::new(),
            phase: Phase::Speculative,
        }
    }

    /// Re-arms a released context for the next attempt.
    pub fn begin(&mut self, id: IterationId) {
        self.locks.rebind(id);
        self.discovered.clear();
        self.phase = Phase::Speculative;
    }

    pub fn id(&self) -> IterationId {
        self.locks.id()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn graph(&self) -> &'g Graph<N> {
        self.graph
    }

    /// Nodes owned so far.
    pub fn owned(&self) -> &[NodeId] {
        self.locks.held()
    }

    /// Work discovered so far, to be scheduled on commit.
    pub fn discovered(&self) -> &[NodeId] {
        &self.discovered
    }

    /// Ends the speculative phase.
    pub fn cautious_point(&mut self) {
        self.phase = Phase::Committing;
    }

    /// Records a newly discovered work item. Delivered only if the iteration commits.
    pub fn push(&mut self, item: NodeId) {
        self.discovered.push(item);
    }

    /// After the cautious point a failed acquisition can no longer be rolled back.
    fn guard<T>(&self, result: Result<T, RefineError>) -> Result<T, RefineError> {
        match result {
            Err(RefineError::Conflict { node }) if self.phase == Phase::Committing => Err(
                RefineError::invariant(node, "ownership conflict after the cautious point"),
            ),
            other => other,
        }
    }

    pub fn get_data(&mut self, node: NodeId, flag: MethodFlag) -> Result<Arc<N>, RefineError> {
        let result = self.graph.get_data(node, flag, &mut self.locks);
        self.guard(result)
    }

    pub fn contains_node(&mut self, node: NodeId, flag: MethodFlag) -> Result<bool, RefineError> {
        let result = self.graph.contains_node(node, flag, &mut self.locks);
        self.guard(result)
    }

    pub fn neighbors(&mut self, node: NodeId, flag: MethodFlag) -> Result<Vec<NodeId>, RefineError> {
        let result = self.graph.neighbors(node, flag, &mut self.locks);
        self.guard(result)
    }

    pub fn remove_node(&mut self, node: NodeId, flag: MethodFlag) -> Result<(), RefineError> {
        debug_assert_eq!(self.phase, Phase::Committing, "mutation before the cautious point");
        let result = self.graph.remove_node(node, flag, &mut self.locks);
        self.guard(result)
    }

    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, flag: MethodFlag) -> Result<(), RefineError> {
        debug_assert_eq!(self.phase, Phase::Committing, "mutation before the cautious point");
        let result = self.graph.add_edge(src, dst, flag, &mut self.locks);
        self.guard(result)
    }

    pub fn create_node(&mut self, data: N) -> NodeId {
        debug_assert_eq!(self.phase, Phase::Committing, "mutation before the cautious point");
        self.graph.create_node(data, &mut self.locks)
    }

    /// Discards discovered work and drops all ownership.
    pub fn abort(&mut self) {
        self.discovered.clear();
        self.graph.locks().release(&mut self.locks);
    }

    /// Drops all ownership, then hands discovered work to `schedule`.
    pub fn commit(&mut self, schedule: impl FnOnce(&mut Vec<NodeId>)) {
        self.graph.locks().release(&mut self.locks);
        schedule(&mut self.discovered);
        self.discovered.clear();
    }
}

impl<N> Drop for IterationContext<'_, N> {
    fn drop(&mut self) {
        self.graph.locks().release(&mut self.locks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Graph<u8>, NodeId, NodeId) {
        let mut g = Graph::new();
        let a = g.insert(1);
        let b = g.insert(2);
        g.connect(a, b).unwrap();
        (g, a, b)
    }

    #[test]
    fn abort_releases_and_forgets_discoveries() {
        let (g, a, b) = pair();
        let mut cx = IterationContext::new(&g, IterationId::new(1));
        cx.neighbors(a, MethodFlag::Write).unwrap();
        cx.push(b);
        assert_eq!(cx.owned().len(), 2);
        cx.abort();
        assert!(cx.owned().is_empty());
        assert!(cx.discovered().is_empty());
        assert_eq!(g.locks().owned_count(), 0);
    }

    #[test]
    fn commit_releases_before_scheduling() {
        let (g, a, b) = pair();
        let mut cx = IterationContext::new(&g, IterationId::new(1));
        cx.get_data(a, MethodFlag::Write).unwrap();
        cx.push(b);
        let mut scheduled = Vec::new();
        cx.commit(|items| {
            assert_eq!(g.locks().owned_count(), 0);
            assert!(g.locks().owner_of(a).is_none());
            scheduled.append(items);
        });
        assert_eq!(scheduled, vec![b]);
        assert_eq!(g.locks().owned_count(), 0);
    }

    #[test]
    fn conflict_after_cautious_point_is_fatal() {
        let (g, a, _) = pair();
        let mut other = IterationContext::new(&g, IterationId::new(1));
        other.get_data(a, MethodFlag::Write).unwrap();

        let mut cx = IterationContext::new(&g, IterationId::new(2));
        assert!(cx.get_data(a, MethodFlag::Write).unwrap_err().is_retryable());
        cx.cautious_point();
        let err = cx.get_data(a, MethodFlag::Write).unwrap_err();
        assert!(matches!(err, RefineError::Invariant { node, .. } if node == a));
    }

    #[test]
    fn begin_rearms_a_released_context() {
        let (g, a, _) = pair();
        let mut cx = IterationContext::new(&g, IterationId::new(1));
        cx.get_data(a, MethodFlag::Write).unwrap();
        cx.cautious_point();
        cx.abort();
        cx.begin(IterationId::new(2));
        assert_eq!(cx.phase(), Phase::Speculative);
        cx.get_data(a, MethodFlag::Write).unwrap();
        assert!(g.locks().is_owned_by(a, IterationId::new(2)));
    }

    #[test]
    fn dropping_a_context_releases_its_nodes() {
        let (g, a, b) = pair();
        {
            let mut cx = IterationContext::new(&g, IterationId::new(1));
            cx.neighbors(a, MethodFlag::Read).unwrap();
        }
        assert_eq!(g.locks().owner_of(b), None);
    }
}
