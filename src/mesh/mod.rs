//! Mesh construction.
//!
//! A [`Mesh`] is a [`Graph`] of [`Element`]s: one node per triangle, one node
//! per boundary segment, and an edge between every pair of elements sharing a
//! side. It is built once from an indexed triangle list and then handed to
//! the refinement driver.

pub mod verifier;

use crate::geometry::{Element, Tuple};
use crate::refine_error::RefineError;
use crate::runtime::graph::Graph;
use crate::runtime::node::NodeId;
use hashbrown::HashMap;
use itertools::Itertools;
use std::f64::consts::TAU;

pub use verifier::{MeshSummary, verify};

fn invalid_mesh(message: impl Into<String>) -> RefineError {
    RefineError::InvalidMesh(message.into())
}

/// Triangle mesh with boundary segments, stored as an element graph.
#[derive(Debug, Default)]
pub struct Mesh {
    graph: Graph<Element>,
}

impl Mesh {
    /// Builds a mesh from `points` and counter-clockwise or clockwise index triples.
    ///
    /// Triangles sharing a side become neighbours; a side used by exactly one
    /// triangle becomes a boundary [`Element::Segment`]. Triangle nodes are
    /// created first, in input order, followed by the segments.
    ///
    /// # Errors
    /// [`RefineError::InvalidMesh`] for an out-of-range index, a degenerate
    /// triangle, or a side shared by more than two triangles.
    pub fn from_triangles(points: &[Tuple], triangles: &[[usize; 3]]) -> Result<Self, RefineError> {
        let mut graph = Graph::new();
        let mut sides: HashMap<(usize, usize), Vec<NodeId>> = HashMap::new();
        let mut order = Vec::new();

        for (t, tri) in triangles.iter().enumerate() {
            if let Some(&bad) = tri.iter().find(|&&i| i >= points.len()) {
                return Err(invalid_mesh(format!(
                    "triangle {t} references missing point {bad} ({} points)",
                    points.len()
                )));
            }
            let [a, b, c] = tri.map(|i| points[i]);
            if Tuple::orient(&a, &b, &c) == 0.0 {
                return Err(invalid_mesh(format!("triangle {t} is degenerate")));
            }
            let id = graph.insert(Element::triangle(a, b, c));
            for (i, j) in tri.iter().copied().circular_tuple_windows::<(usize, usize)>() {
                let key = (i.min(j), i.max(j));
                let owners = sides.entry(key).or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                });
                owners.push(id);
                if owners.len() > 2 {
                    return Err(invalid_mesh(format!(
                        "side ({}, {}) is shared by more than two triangles",
                        key.0, key.1
                    )));
                }
            }
        }

        for key in order {
            match sides[&key].as_slice() {
                [a, b] => graph.connect(*a, *b)?,
                [owner] => {
                    let segment = graph.insert(Element::segment(points[key.0], points[key.1]));
                    graph.connect(segment, *owner)?;
                }
                _ => unreachable!("every recorded side has one or two owners"),
            }
        }

        log::debug!(
            "mesh built: {} triangles, {} elements",
            triangles.len(),
            graph.len()
        );
        Ok(Self { graph })
    }

    /// `nx` × `ny` grid over `[0, width] × [0, height]`, each cell split along
    /// its rising diagonal.
    pub fn rectangle(nx: usize, ny: usize, width: f64, height: f64) -> Result<Self, RefineError> {
        if nx == 0 || ny == 0 {
            return Err(invalid_mesh("rectangle needs at least one cell per direction"));
        }
        if !(width > 0.0 && height > 0.0) {
            return Err(invalid_mesh(format!(
                "rectangle extent must be positive, got {width} x {height}"
            )));
        }
        let points: Vec<Tuple> = (0..=ny)
            .cartesian_product(0..=nx)
            .map(|(j, i)| {
                Tuple::new(
                    width * i as f64 / nx as f64,
                    height * j as f64 / ny as f64,
                )
            })
            .collect();
        let at = |i: usize, j: usize| j * (nx + 1) + i;
        let triangles: Vec<[usize; 3]> = (0..ny)
            .cartesian_product(0..nx)
            .flat_map(|(j, i)| {
                let (a, b, c, d) = (at(i, j), at(i + 1, j), at(i + 1, j + 1), at(i, j + 1));
                [[a, b, c], [a, c, d]]
            })
            .collect();
        Self::from_triangles(&points, &triangles)
    }

    /// Disc of `sectors` triangles sharing the origin, rim points on a circle of `radius`.
    pub fn fan(sectors: usize, radius: f64) -> Result<Self, RefineError> {
        if sectors < 3 {
            return Err(invalid_mesh(format!("fan needs at least 3 sectors, got {sectors}")));
        }
        if !(radius > 0.0) {
            return Err(invalid_mesh(format!("fan radius must be positive, got {radius}")));
        }
        let points: Vec<Tuple> = std::iter::once(Tuple::new(0.0, 0.0))
            .chain((0..sectors).map(|k| {
                let phi = TAU * k as f64 / sectors as f64;
                Tuple::new(radius * phi.cos(), radius * phi.sin())
            }))
            .collect();
        let triangles: Vec<[usize; 3]> = (0..sectors)
            .map(|k| [0, 1 + k, 1 + (k + 1) % sectors])
            .collect();
        Self::from_triangles(&points, &triangles)
    }

    pub fn graph(&self) -> &Graph<Element> {
        &self.graph
    }

    pub fn into_graph(self) -> Graph<Element> {
        self.graph
    }

    /// Triangles whose smallest angle is below `min_angle` degrees, ascending by id.
    pub fn bad_elements(&self, min_angle: f64) -> Vec<NodeId> {
        bad_elements(&self.graph, min_angle)
    }

    /// Checks the mesh and summarises it; see [`verify`].
    pub fn verify(&self) -> Result<MeshSummary, RefineError> {
        verify(&self.graph)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

impl From<Graph<Element>> for Mesh {
    fn from(graph: Graph<Element>) -> Self {
        Self { graph }
    }
}

pub(crate) fn bad_elements(graph: &Graph<Element>, min_angle: f64) -> Vec<NodeId> {
    graph
        .node_ids()
        .into_iter()
        .filter(|&id| {
            graph
                .data(id)
                .is_some_and(|element| element.is_bad_below(min_angle))
        })
        .collect()
}
