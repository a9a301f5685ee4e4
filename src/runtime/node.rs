//! `NodeId` and `IterationId`: strong, zero-cost handles for the runtime
//!
//! Every element stored in a [`Graph`](crate::runtime::graph::Graph) is
//! addressed by an opaque `NodeId`. Identifiers are handed out by the graph
//! from a monotonically increasing counter and are never reused, so a stale
//! identifier held by a slow iteration can only ever miss, never alias a
//! newer element.
//!
//! `IterationId` names one speculative attempt at a work item. The lock
//! manager records it as the owner of every node the attempt touches.

use crate::refine_error::RefineError;
use std::{fmt, num::NonZeroU64};

/// Identifier of a node in the graph store.
///
/// This type is `repr(transparent)` over `NonZeroU64`, so `Option<NodeId>`
/// costs no more than a bare `u64`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct NodeId(NonZeroU64);

impl NodeId {
    /// Creates a new `NodeId` from a raw `u64` value.
    ///
    /// Returns [`RefineError::InvalidNodeId`] if `raw == 0`.
    ///
    /// ```rust
    /// # use amorph_refine::runtime::node::NodeId;
    /// let n = NodeId::new(7)?;
    /// assert_eq!(n.get(), 7);
    /// # Ok::<(), amorph_refine::refine_error::RefineError>(())
    /// ```
    #[inline]
    pub fn new(raw: u64) -> Result<Self, RefineError> {
        NonZeroU64::new(raw)
            .map(NodeId)
            .ok_or(RefineError::InvalidNodeId)
    }

    /// The `n`-th identifier of a zero-based counter (`0` maps to `1`).
    #[inline]
    pub(crate) fn from_counter(n: u64) -> Self {
        NodeId(NonZeroU64::MIN.saturating_add(n))
    }

    /// Returns the inner `u64` value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.get()).finish()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Identifier of one speculative iteration attempt.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct IterationId(u64);

impl IterationId {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        IterationId(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IterationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "it#{}", self.0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_zero_is_rejected() {
        assert_eq!(NodeId::new(0), Err(RefineError::InvalidNodeId));
    }

    #[test]
    fn counter_starts_at_one() {
        assert_eq!(NodeId::from_counter(0).get(), 1);
        assert_eq!(NodeId::from_counter(41).get(), 42);
    }

    #[test]
    fn debug_and_display() {
        let n = NodeId::new(7).unwrap();
        assert_eq!(format!("{:?}", n), "NodeId(7)");
        assert_eq!(format!("{}", n), "7");
        assert_eq!(IterationId::new(3).to_string(), "it#3");
    }

    #[test]
    fn json_roundtrip() {
        let n = NodeId::new(123).unwrap();
        let s = serde_json::to_string(&n).unwrap();
        assert_eq!(s, "123");
        let back: NodeId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, n);
    }
}
