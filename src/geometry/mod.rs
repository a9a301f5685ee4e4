//! Planar geometry for mesh refinement.
//!
//! [`tuple`] holds the coordinate type and the predicates built on it,
//! [`element`] the two mesh primitives and the edge relation between them.

pub mod element;
pub mod tuple;

pub use element::{Edge, Element, MIN_ANGLE, OBTUSE_ANGLE};
pub use tuple::Tuple;
