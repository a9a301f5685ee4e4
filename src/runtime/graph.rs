//! Concurrently mutable, undirected graph store.
//!
//! Nodes live in a sharded map keyed by [`NodeId`]; each slot owns its payload
//! (behind an `Arc`, so readers never copy the element) and its adjacency list.
//! Adjacency is stored as identifier lists, never as references, so cyclic
//! neighbour relations need no special handling.
//!
//! Every speculative operation takes a [`MethodFlag`] and the caller's
//! [`LockSet`]:
//!
//! - `Read` / `Write` acquire ownership of the touched nodes through the
//!   graph's [`LockManager`] first and fail with [`RefineError::Conflict`]
//!   if another iteration owns one of them;
//! - `Unprotected` skips acquisition. It is only legal for nodes the
//!   iteration already owns, which debug builds check.
//!
//! Neighbour iteration under a protective flag acquires the node *and* all of
//! its neighbours, so an iteration that has listed a node's neighbours may
//! later rewrite those neighbours' adjacency without further locking.
//!
//! The `&mut self` builder methods and the plain inspection methods
//! ([`Graph::data`], [`Graph::edges`], [`Graph::node_ids`]) bypass the lock
//! table and are meant for quiescent phases: mesh construction before a run
//! and verification after it.

use crate::refine_error::RefineError;
use crate::runtime::lock::{LockManager, LockSet};
use crate::runtime::node::NodeId;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Intended access mode of a graph operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MethodFlag {
    Read,
    Write,
    /// No acquisition; the caller already owns every node involved.
    Unprotected,
}

impl MethodFlag {
    #[inline]
    pub fn is_protected(self) -> bool {
        !matches!(self, MethodFlag::Unprotected)
    }
}

#[derive(Debug)]
struct NodeSlot<N> {
    data: Arc<N>,
    edges: Vec<NodeId>,
}

/// Graph of `N` payloads with symmetric adjacency.
#[derive(Debug)]
pub struct Graph<N> {
    nodes: DashMap<NodeId, NodeSlot<N>>,
    next_id: AtomicU64,
    locks: LockManager,
}

impl<N> Default for Graph<N> {
    fn default() -> Self {
        Self {
            nodes: DashMap::new(),
            next_id: AtomicU64::new(0),
            locks: LockManager::new(),
        }
    }
}

impl<N> Graph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock table shared by every iteration running against this graph.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    fn fresh_id(&self) -> NodeId {
        NodeId::from_counter(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn acquire(&self, node: NodeId, flag: MethodFlag, locks: &mut LockSet) -> Result<(), RefineError> {
        if flag.is_protected() {
            if !self.locks.try_acquire(node, locks) {
                return Err(RefineError::Conflict { node });
            }
        } else {
            self.locks.assert_owned_unchecked(node, locks);
        }
        Ok(())
    }

    /// Missing nodes are stale for speculative readers and a hard error otherwise.
    fn missing(node: NodeId, flag: MethodFlag) -> RefineError {
        if flag.is_protected() {
            RefineError::StaleNode(node)
        } else {
            RefineError::MissingNode(node)
        }
    }

    // ---------------------------------------------------------------------
    // Speculative API
    // ---------------------------------------------------------------------

    /// Inserts `data` as a fresh, unconnected node owned by `locks`.
    ///
    /// Always succeeds. The new node is invisible to other iterations until an
    /// edge to an existing node is added, and it stays owned by its creator
    /// until the creator releases.
    pub fn create_node(&self, data: N, locks: &mut LockSet) -> NodeId {
        let id = self.fresh_id();
        self.nodes.insert(
            id,
            NodeSlot {
                data: Arc::new(data),
                edges: Vec::new(),
            },
        );
        let acquired = self.locks.try_acquire(id, locks);
        debug_assert!(acquired, "fresh node {id} already owned");
        id
    }

    /// Payload of `node`.
    pub fn get_data(&self, node: NodeId, flag: MethodFlag, locks: &mut LockSet) -> Result<Arc<N>, RefineError> {
        self.acquire(node, flag, locks)?;
        self.nodes
            .get(&node)
            .map(|slot| Arc::clone(&slot.data))
            .ok_or_else(|| Self::missing(node, flag))
    }

    /// Locked existence check.
    ///
    /// Ownership of `node` is taken even when it is absent, which keeps a
    /// concurrent iteration from observing the same identifier in between.
    pub fn contains_node(&self, node: NodeId, flag: MethodFlag, locks: &mut LockSet) -> Result<bool, RefineError> {
        self.acquire(node, flag, locks)?;
        Ok(self.nodes.contains_key(&node))
    }

    /// Neighbours of `node`; under a protective flag every neighbour is acquired too.
    pub fn neighbors(&self, node: NodeId, flag: MethodFlag, locks: &mut LockSet) -> Result<Vec<NodeId>, RefineError> {
        self.acquire(node, flag, locks)?;
        let edges = self
            .nodes
            .get(&node)
            .map(|slot| slot.edges.clone())
            .ok_or_else(|| Self::missing(node, flag))?;
        for &next in &edges {
            self.acquire(next, flag, locks)?;
        }
        Ok(edges)
    }

    /// Removes `node` and every edge incident to it.
    pub fn remove_node(&self, node: NodeId, flag: MethodFlag, locks: &mut LockSet) -> Result<(), RefineError> {
        // Acquire the whole neighbourhood before mutating anything.
        let edges = self.neighbors(node, flag, locks)?;
        self.nodes.remove(&node);
        for next in edges {
            if let Some(mut slot) = self.nodes.get_mut(&next) {
                slot.edges.retain(|&n| n != node);
            }
        }
        Ok(())
    }

    /// Adds the undirected edge `src`–`dst`. Adding an existing edge is a no-op.
    pub fn add_edge(&self, src: NodeId, dst: NodeId, flag: MethodFlag, locks: &mut LockSet) -> Result<(), RefineError> {
        self.acquire(src, flag, locks)?;
        self.acquire(dst, flag, locks)?;
        if !self.nodes.contains_key(&src) {
            return Err(Self::missing(src, flag));
        }
        if !self.nodes.contains_key(&dst) {
            return Err(Self::missing(dst, flag));
        }
        self.link(src, dst);
        Ok(())
    }

    fn link(&self, src: NodeId, dst: NodeId) {
        for (a, b) in [(src, dst), (dst, src)] {
            if let Some(mut slot) = self.nodes.get_mut(&a) {
                if !slot.edges.contains(&b) {
                    slot.edges.push(b);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Quiescent API
    // ---------------------------------------------------------------------

    /// Inserts a node outside of any iteration.
    pub fn insert(&mut self, data: N) -> NodeId {
        let id = self.fresh_id();
        self.nodes.insert(
            id,
            NodeSlot {
                data: Arc::new(data),
                edges: Vec::new(),
            },
        );
        id
    }

    /// Connects two existing nodes outside of any iteration.
    pub fn connect(&mut self, src: NodeId, dst: NodeId) -> Result<(), RefineError> {
        for node in [src, dst] {
            if !self.nodes.contains_key(&node) {
                return Err(RefineError::MissingNode(node));
            }
        }
        self.link(src, dst);
        Ok(())
    }

    /// Payload of `node` without acquiring ownership.
    pub fn data(&self, node: NodeId) -> Option<Arc<N>> {
        self.nodes.get(&node).map(|slot| Arc::clone(&slot.data))
    }

    /// Adjacency of `node` without acquiring ownership.
    pub fn edges(&self, node: NodeId) -> Option<Vec<NodeId>> {
        self.nodes.get(&node).map(|slot| slot.edges.clone())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// All node identifiers, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sorted node → sorted-neighbours map; equal snapshots mean equal node and edge sets.
    pub fn topology(&self) -> BTreeMap<NodeId, Vec<NodeId>> {
        self.nodes
            .iter()
            .map(|entry| {
                let mut edges = entry.edges.clone();
                edges.sort_unstable();
                (*entry.key(), edges)
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::node::IterationId;

    fn path(len: usize) -> (Graph<usize>, Vec<NodeId>) {
        let mut g = Graph::new();
        let ids: Vec<_> = (0..len).map(|i| g.insert(i)).collect();
        for pair in ids.windows(2) {
            g.connect(pair[0], pair[1]).unwrap();
        }
        (g, ids)
    }

    #[test]
    fn edges_are_symmetric_and_deduplicated() {
        let (mut g, ids) = path(3);
        g.connect(ids[0], ids[1]).unwrap();
        assert_eq!(g.edges(ids[0]).unwrap(), vec![ids[1]]);
        assert_eq!(g.edges(ids[1]).unwrap(), vec![ids[0], ids[2]]);
    }

    #[test]
    fn protected_neighbors_lock_the_whole_neighbourhood() {
        let (g, ids) = path(4);
        let mut a = LockSet::new(IterationId::new(1));
        let nbrs = g.neighbors(ids[1], MethodFlag::Write, &mut a).unwrap();
        assert_eq!(nbrs, vec![ids[0], ids[2]]);
        for id in &ids[..3] {
            assert!(g.locks().is_owned_by(*id, a.id()));
        }
        assert_eq!(g.locks().owner_of(ids[3]), None);

        let mut b = LockSet::new(IterationId::new(2));
        let err = g.get_data(ids[2], MethodFlag::Read, &mut b).unwrap_err();
        assert_eq!(err, RefineError::Conflict { node: ids[2] });
        assert!(g.get_data(ids[3], MethodFlag::Read, &mut b).is_ok());
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let (g, ids) = path(3);
        let mut a = LockSet::new(IterationId::new(1));
        g.remove_node(ids[1], MethodFlag::Write, &mut a).unwrap();
        assert!(!g.contains(ids[1]));
        assert!(g.edges(ids[0]).unwrap().is_empty());
        assert!(g.edges(ids[2]).unwrap().is_empty());
        assert!(!g.contains_node(ids[1], MethodFlag::Write, &mut a).unwrap());
    }

    #[test]
    fn stale_versus_missing() {
        let (g, ids) = path(2);
        let mut a = LockSet::new(IterationId::new(1));
        g.remove_node(ids[0], MethodFlag::Write, &mut a).unwrap();
        assert_eq!(
            g.get_data(ids[0], MethodFlag::Write, &mut a).unwrap_err(),
            RefineError::StaleNode(ids[0])
        );
        assert_eq!(
            g.get_data(ids[0], MethodFlag::Unprotected, &mut a).unwrap_err(),
            RefineError::MissingNode(ids[0])
        );
    }

    #[test]
    fn created_nodes_are_owned_by_their_creator() {
        let (g, ids) = path(1);
        let mut a = LockSet::new(IterationId::new(1));
        assert!(g.contains_node(ids[0], MethodFlag::Write, &mut a).unwrap());
        let fresh = g.create_node(99, &mut a);
        assert!(g.locks().is_owned_by(fresh, a.id()));
        g.add_edge(fresh, ids[0], MethodFlag::Unprotected, &mut a).unwrap();
        assert_eq!(*g.get_data(fresh, MethodFlag::Unprotected, &mut a).unwrap(), 99);
        g.locks().release(&mut a);
        assert_eq!(g.edges(ids[0]).unwrap(), vec![fresh]);
        assert_eq!(g.locks().owned_count(), 0);
    }

    #[test]
    fn identifiers_are_never_reused() {
        let (mut g, ids) = path(2);
        let mut a = LockSet::new(IterationId::new(1));
        g.remove_node(ids[1], MethodFlag::Write, &mut a).unwrap();
        g.locks().release(&mut a);
        let next = g.insert(7);
        assert!(next > ids[1]);
    }

    #[test]
    fn topology_snapshot_is_order_independent() {
        let (g, ids) = path(3);
        let snap = g.topology();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[&ids[1]], vec![ids[0], ids[2]]);
    }
}
