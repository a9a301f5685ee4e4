//! Optimistic per-node ownership.
//!
//! The [`LockManager`] maps each node to the iteration that currently owns
//! it. Acquisition never waits: a node owned by someone else is reported back
//! as a conflict and the caller aborts. Since no iteration ever blocks while
//! holding ownership, no lock ordering is needed and deadlock cannot occur.
//!
//! Ownership acquired by one iteration is tracked in its [`LockSet`], which is
//! handed back to [`LockManager::release`] on commit or abort.

use crate::runtime::node::{IterationId, NodeId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Nodes owned by a single iteration attempt.
#[derive(Debug)]
pub struct LockSet {
    id: IterationId,
    held: Vec<NodeId>,
}

impl LockSet {
    pub fn new(id: IterationId) -> Self {
        Self {
            id,
            held: Vec::new(),
        }
    }

    /// Owner identity recorded in the lock table.
    #[inline]
    pub fn id(&self) -> IterationId {
        self.id
    }

    /// Nodes acquired so far, in acquisition order.
    pub fn held(&self) -> &[NodeId] {
        &self.held
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Re-arms the set for a new attempt. Must only be called once released.
    pub(crate) fn rebind(&mut self, id: IterationId) {
        debug_assert!(self.held.is_empty(), "rebinding a lock set that still owns nodes");
        self.id = id;
        self.held.clear();
    }
}

/// Node → owning iteration table.
#[derive(Debug, Default)]
pub struct LockManager {
    owners: DashMap<NodeId, IterationId>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to give `node` to `locks`.
    ///
    /// Succeeds if the node is free (ownership is assigned atomically) or
    /// already owned by the same iteration (no-op). Returns `false` if another
    /// iteration owns it; the caller must treat that as a conflict.
    pub fn try_acquire(&self, node: NodeId, locks: &mut LockSet) -> bool {
        match self.owners.entry(node) {
            Entry::Occupied(owner) => *owner.get() == locks.id,
            Entry::Vacant(slot) => {
                slot.insert(locks.id);
                locks.held.push(node);
                true
            }
        }
    }

    /// Declares that `locks` already owns `node`, without acquiring anything.
    ///
    /// This is the contract behind unprotected access: the caller must have
    /// acquired the node earlier in the same iteration. Only debug builds
    /// verify it.
    #[inline]
    pub fn assert_owned_unchecked(&self, node: NodeId, locks: &LockSet) {
        debug_assert!(
            self.is_owned_by(node, locks.id),
            "unprotected access to node {node} not owned by {}",
            locks.id
        );
    }

    /// Current owner of `node`, if any.
    pub fn owner_of(&self, node: NodeId) -> Option<IterationId> {
        self.owners.get(&node).map(|owner| *owner)
    }

    pub fn is_owned_by(&self, node: NodeId, id: IterationId) -> bool {
        self.owner_of(node) == Some(id)
    }

    /// Drops every ownership held by `locks`.
    pub fn release(&self, locks: &mut LockSet) {
        let id = locks.id;
        for node in locks.held.drain(..) {
            self.owners.remove_if(&node, |_, owner| *owner == id);
        }
    }

    /// Number of nodes owned by any iteration.
    pub fn owned_count(&self) -> usize {
        self.owners.len()
    }
}
