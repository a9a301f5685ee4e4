//! Consistency checks for a quiescent element graph.
//!
//! Run before refinement to reject a broken starting mesh and after it to
//! confirm that no commit tore the mesh: every triangle has three
//! neighbours, every segment one, adjacency is symmetric, neighbours really
//! share a side, and no edge points at a removed node.

use crate::debug_invariants::DebugInvariants;
use crate::geometry::{Element, MIN_ANGLE};
use crate::refine_error::RefineError;
use crate::runtime::graph::Graph;
use serde::{Deserialize, Serialize};

/// Shape of a verified mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSummary {
    pub triangles: usize,
    pub segments: usize,
    /// Triangles still below the quality threshold.
    pub bad: usize,
    /// Total triangle area; refinement must preserve it.
    pub area: f64,
}

impl MeshSummary {
    /// Same element counts, bad count, and area within `tol`.
    pub fn equivalent(&self, other: &MeshSummary, tol: f64) -> bool {
        self.triangles == other.triangles
            && self.segments == other.segments
            && self.bad == other.bad
            && (self.area - other.area).abs() <= tol
    }
}

/// [`verify_below`] with the default [`MIN_ANGLE`].
pub fn verify(graph: &Graph<Element>) -> Result<MeshSummary, RefineError> {
    verify_below(graph, MIN_ANGLE)
}

/// Checks every element of `graph`, counting triangles below `min_angle` as bad.
pub fn verify_below(graph: &Graph<Element>, min_angle: f64) -> Result<MeshSummary, RefineError> {
    let mut summary = MeshSummary::default();
    for id in graph.node_ids() {
        let element = graph.data(id).ok_or(RefineError::MissingNode(id))?;
        let edges = graph.edges(id).ok_or(RefineError::MissingNode(id))?;

        let expected = match &*element {
            Element::Triangle(_) => 3,
            Element::Segment(_) => 1,
        };
        if edges.len() != expected {
            return Err(RefineError::invariant(
                id,
                format!("{} neighbours, expected {expected}", edges.len()),
            ));
        }

        for &next in &edges {
            let Some(other) = graph.data(next) else {
                return Err(RefineError::invariant(id, format!("edge to removed node {next}")));
            };
            let symmetric = graph.edges(next).is_some_and(|back| back.contains(&id));
            if !symmetric {
                return Err(RefineError::invariant(id, format!("edge to {next} is one-sided")));
            }
            if !element.is_related(&other) {
                return Err(RefineError::invariant(id, format!("neighbour {next} shares no side")));
            }
        }

        match &*element {
            Element::Triangle(t) => {
                let area = t.area();
                if !(area > 0.0) || !element.center().x().is_finite() {
                    return Err(RefineError::invariant(id, "degenerate triangle"));
                }
                summary.triangles += 1;
                summary.area += area;
                if element.is_bad_below(min_angle) {
                    summary.bad += 1;
                }
            }
            Element::Segment(_) => summary.segments += 1,
        }
    }
    log::debug!(
        "verified mesh: {} triangles, {} segments, {} bad, area {:.6}",
        summary.triangles,
        summary.segments,
        summary.bad,
        summary.area
    );
    Ok(summary)
}

impl DebugInvariants for Graph<Element> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "element graph invalid");
    }

    fn validate_invariants(&self) -> Result<(), RefineError> {
        verify(self).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Tuple;
    use crate::mesh::Mesh;

    #[test]
    fn generated_meshes_verify() {
        let s = verify(Mesh::rectangle(2, 3, 2.0, 3.0).unwrap().graph()).unwrap();
        assert_eq!((s.triangles, s.segments, s.bad), (12, 10, 0));
        assert!((s.area - 6.0).abs() < 1e-12);

        let s = verify(Mesh::rectangle(4, 2, 4.0, 0.8).unwrap().graph()).unwrap();
        assert_eq!(s.bad, 16);
        assert_eq!(verify_below(Mesh::rectangle(4, 2, 4.0, 0.8).unwrap().graph(), 20.0).unwrap().bad, 0);
    }

    #[test]
    fn lonely_triangle_has_wrong_degree() {
        let mut g = Graph::new();
        let id = g.insert(Element::triangle(
            Tuple::new(0.0, 0.0),
            Tuple::new(1.0, 0.0),
            Tuple::new(0.0, 1.0),
        ));
        let err = verify(&g).unwrap_err();
        assert!(matches!(err, RefineError::Invariant { node, .. } if node == id));
        assert!(g.validate_invariants().is_err());
    }

    #[test]
    fn neighbours_must_share_a_side() {
        let mut g = Graph::new();
        let a = g.insert(Element::segment(Tuple::new(0.0, 0.0), Tuple::new(1.0, 0.0)));
        let b = g.insert(Element::segment(Tuple::new(5.0, 0.0), Tuple::new(6.0, 0.0)));
        g.connect(a, b).unwrap();
        let err = verify(&g).unwrap_err();
        assert!(matches!(err, RefineError::Invariant { reason, .. } if reason.contains("shares no side")));
    }

    #[test]
    fn summaries_compare_with_tolerance() {
        let a = MeshSummary {
            triangles: 4,
            segments: 4,
            bad: 0,
            area: 1.0,
        };
        let b = MeshSummary { area: 1.0 + 1e-13, ..a };
        assert!(a.equivalent(&b, 1e-9));
        assert!(!a.equivalent(&MeshSummary { triangles: 5, ..a }, 1e-9));
    }
}
