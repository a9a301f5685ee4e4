//! Mesh elements: triangles and boundary segments.
//!
//! An [`Element`] is a sum type over the two primitives a refinement mesh is
//! made of. Both variants cache what the cavity algorithm asks for repeatedly
//! (circumcentre, squared radius, smallest angle, obtuse vertex) at
//! construction; elements are immutable afterwards.
//!
//! | variant    | `dim()` | centre                | neighbours |
//! |------------|---------|-----------------------|------------|
//! | `Triangle` | 3       | circumcentre          | 3          |
//! | `Segment`  | 2       | midpoint (diametral)  | 1          |

use crate::geometry::tuple::Tuple;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Triangles with an angle below this (degrees) are bad by default.
pub const MIN_ANGLE: f64 = 30.0;
/// Angles above this (degrees) make a triangle obtuse. The slack over 90°
/// keeps right triangles from flipping on rounding noise.
pub const OBTUSE_ANGLE: f64 = 90.1;

/// Relation between two adjacent elements: the two points they share.
///
/// Points are stored in lexicographic order, so an edge compares equal
/// regardless of the orientation it was built from.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    points: [Tuple; 2],
}

impl Edge {
    pub fn new(a: Tuple, b: Tuple) -> Self {
        let points = match a.lex_cmp(&b) {
            Ordering::Greater => [b, a],
            _ => [a, b],
        };
        Self { points }
    }

    #[inline]
    pub fn point(&self, i: usize) -> Tuple {
        self.points[i]
    }

    pub fn contains(&self, p: &Tuple) -> bool {
        self.points.contains(p)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    points: [Tuple; 3],
    center: Tuple,
    radius_squared: f64,
    min_angle: f64,
    obtuse: Option<usize>,
}

impl Triangle {
    pub fn new(a: Tuple, b: Tuple, c: Tuple) -> Self {
        let points = [a, b, c];
        let mut min_angle = f64::INFINITY;
        let mut obtuse = None;
        for i in 0..3 {
            let angle = Tuple::angle(&points[(i + 1) % 3], &points[i], &points[(i + 2) % 3]);
            if angle > OBTUSE_ANGLE {
                obtuse = Some(i);
            }
            min_angle = min_angle.min(angle);
        }
        let center = Tuple::circumcenter(&a, &b, &c);
        Self {
            points,
            center,
            radius_squared: center.distance_squared(&a),
            min_angle,
            obtuse,
        }
    }

    pub fn points(&self) -> &[Tuple; 3] {
        &self.points
    }

    /// Smallest interior angle, in degrees.
    pub fn min_angle(&self) -> f64 {
        self.min_angle
    }

    /// Unsigned area.
    pub fn area(&self) -> f64 {
        0.5 * Tuple::orient(&self.points[0], &self.points[1], &self.points[2]).abs()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    points: [Tuple; 2],
    center: Tuple,
    radius_squared: f64,
}

impl Segment {
    pub fn new(a: Tuple, b: Tuple) -> Self {
        let center = a.midpoint(&b);
        Self {
            points: [a, b],
            center,
            radius_squared: center.distance_squared(&a),
        }
    }

    pub fn points(&self) -> &[Tuple; 2] {
        &self.points
    }
}

/// A mesh element owned by the graph store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Triangle(Triangle),
    Segment(Segment),
}

impl Element {
    pub fn triangle(a: Tuple, b: Tuple, c: Tuple) -> Self {
        Element::Triangle(Triangle::new(a, b, c))
    }

    pub fn segment(a: Tuple, b: Tuple) -> Self {
        Element::Segment(Segment::new(a, b))
    }

    /// 3 for triangles, 2 for segments.
    #[inline]
    pub fn dim(&self) -> usize {
        match self {
            Element::Triangle(_) => 3,
            Element::Segment(_) => 2,
        }
    }

    pub fn is_segment(&self) -> bool {
        matches!(self, Element::Segment(_))
    }

    pub fn points(&self) -> &[Tuple] {
        match self {
            Element::Triangle(t) => &t.points,
            Element::Segment(s) => &s.points,
        }
    }

    #[inline]
    pub fn point(&self, i: usize) -> Tuple {
        self.points()[i]
    }

    /// Circumcentre of a triangle, midpoint of a segment.
    pub fn center(&self) -> Tuple {
        match self {
            Element::Triangle(t) => t.center,
            Element::Segment(s) => s.center,
        }
    }

    pub fn radius_squared(&self) -> f64 {
        match self {
            Element::Triangle(t) => t.radius_squared,
            Element::Segment(s) => s.radius_squared,
        }
    }

    /// Whether `p` lies in the (closed) circumcircle, or the diametral circle of a segment.
    pub fn in_circle(&self, p: Tuple) -> bool {
        self.center().distance_squared(&p) <= self.radius_squared()
    }

    pub fn is_obtuse(&self) -> bool {
        self.obtuse_vertex().is_some()
    }

    /// The vertex carrying the obtuse angle, if any.
    pub fn obtuse_vertex(&self) -> Option<Tuple> {
        match self {
            Element::Triangle(t) => t.obtuse.map(|i| t.points[i]),
            Element::Segment(_) => None,
        }
    }

    /// Bad with respect to [`MIN_ANGLE`].
    pub fn is_bad(&self) -> bool {
        self.is_bad_below(MIN_ANGLE)
    }

    /// A triangle is bad when its smallest angle is below `min_angle` degrees.
    /// Segments are never bad.
    pub fn is_bad_below(&self, min_angle: f64) -> bool {
        match self {
            Element::Triangle(t) => t.min_angle < min_angle,
            Element::Segment(_) => false,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Element::Triangle(t) => t.area(),
            Element::Segment(_) => 0.0,
        }
    }

    fn shared_points(&self, other: &Element) -> impl Iterator<Item = Tuple> + '_ {
        let theirs = other.points().to_vec();
        self.points()
            .iter()
            .copied()
            .filter(move |p| theirs.contains(p))
    }

    /// Whether the two elements share an edge.
    pub fn is_related(&self, other: &Element) -> bool {
        self.shared_points(other).count() == 2
    }

    /// The edge shared with `other`, if they share exactly one.
    pub fn related_edge(&self, other: &Element) -> Option<Edge> {
        let shared: Vec<Tuple> = self.shared_points(other).collect();
        match shared.as_slice() {
            [a, b] => Some(Edge::new(*a, *b)),
            _ => None,
        }
    }
}
