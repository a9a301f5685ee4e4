//! The cavity: one local re-triangulation step.
//!
//! Given a bad element, the cavity
//!
//! 1. **initialises** by chasing obtuse triangles across the side opposite
//!    their obtuse angle until it reaches a non-obtuse anchor, whose
//!    circumcentre (or midpoint, for a segment) becomes the new vertex;
//! 2. **builds** the region of elements whose circumcircle contains that
//!    vertex, collecting the boundary sides between the region and the rest
//!    of the mesh (re-anchoring once on an encroached boundary segment);
//! 3. **computes** the replacement: one triangle per boundary side fanned
//!    around the new vertex, plus two half segments when anchored on a
//!    segment;
//! 4. **updates** the graph, swapping the old region for the new one.
//!
//! Steps 1–3 only read the graph, acquiring every node they touch. The
//! replacement is staged inside the cavity rather than inserted, so an abort
//! anywhere before step 4 leaves no trace in the graph. Step 4 runs after
//! the cautious point with unprotected access only.
//!
//! A worker keeps one cavity for its whole lifetime; every buffer is cleared
//! on [`Cavity::initialize`] and keeps its capacity.

use crate::geometry::{Edge, Element, Tuple};
use crate::refine_error::RefineError;
use crate::runtime::context::IterationContext;
use crate::runtime::graph::MethodFlag;
use crate::runtime::node::NodeId;
use std::sync::Arc;

/// Progress of the cavity through one iteration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CavityState {
    Initializing,
    Building,
    ComputingPost,
    Updating,
    Committed,
    Aborted,
}

/// Outcome of classifying one neighbour during [`Cavity::build`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expansion {
    /// Inside the cavity (possibly already known).
    Member,
    /// Outside; the shared side was recorded as a connection.
    Boundary,
    /// An encroached segment took over as anchor; growth restarted from it.
    Reanchored,
}

/// Boundary side between a cavity element `src` and an outside element `dst`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Connection {
    pub src: NodeId,
    pub dst: NodeId,
    pub edge: Edge,
}

/// Endpoint of a staged edge: a node already in the graph or a staged element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PostEnd {
    Existing(NodeId),
    Staged(usize),
}

/// Edge from staged element `from` to `to`, inserted on update.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PostEdge {
    pub from: usize,
    pub to: PostEnd,
}

#[derive(Clone, Debug)]
struct Anchor {
    node: NodeId,
    element: Arc<Element>,
}

#[derive(Debug)]
pub struct Cavity {
    center: Tuple,
    anchor: Option<Anchor>,
    dim: usize,
    frontier: Vec<NodeId>,
    pre: Vec<NodeId>,
    post: Vec<Element>,
    post_edges: Vec<PostEdge>,
    connections: Vec<Connection>,
    state: CavityState,
    min_angle: f64,
    chase_limit: usize,
}

impl Cavity {
    pub fn new(min_angle: f64, chase_limit: usize) -> Self {
        Self {
            center: Tuple::default(),
            anchor: None,
            dim: 0,
            frontier: Vec::new(),
            pre: Vec::new(),
            post: Vec::new(),
            post_edges: Vec::new(),
            connections: Vec::new(),
            state: CavityState::Initializing,
            min_angle,
            chase_limit,
        }
    }

    /// The vertex every replacement element shares.
    pub fn center(&self) -> Tuple {
        self.center
    }

    /// `dim()` of the anchor: 3 for a triangle, 2 for a segment.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn anchor(&self) -> Option<NodeId> {
        self.anchor.as_ref().map(|a| a.node)
    }

    pub fn state(&self) -> CavityState {
        self.state
    }

    pub fn frontier(&self) -> &[NodeId] {
        &self.frontier
    }

    /// Elements to be removed.
    pub fn pre(&self) -> &[NodeId] {
        &self.pre
    }

    /// Staged replacement elements.
    pub fn post(&self) -> &[Element] {
        &self.post
    }

    pub fn post_edges(&self) -> &[PostEdge] {
        &self.post_edges
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = CavityState::Aborted;
    }

    fn reset(&mut self) {
        self.anchor = None;
        self.frontier.clear();
        self.pre.clear();
        self.post.clear();
        self.post_edges.clear();
        self.connections.clear();
    }

    /// Anchors the cavity on `node`, or on the first non-obtuse element of
    /// the obtuse chain starting there.
    ///
    /// # Errors
    /// [`RefineError::StaleNode`] if an element of the chain has been removed
    /// by a concurrent commit, [`RefineError::ChaseLimit`] if the chain does
    /// not settle, plus any acquisition conflict.
    pub fn initialize(&mut self, node: NodeId, cx: &mut IterationContext<'_, Element>) -> Result<(), RefineError> {
        self.reset();
        self.state = CavityState::Initializing;

        let mut current = node;
        let mut element = element_of(cx, current)?;
        let mut steps = 0;
        loop {
            if !cx.contains_node(current, MethodFlag::Write)? {
                return Err(RefineError::StaleNode(current));
            }
            if !element.is_obtuse() {
                break;
            }
            if steps == self.chase_limit {
                return Err(RefineError::ChaseLimit {
                    node,
                    limit: self.chase_limit,
                });
            }
            steps += 1;
            current = opposite(current, &element, cx)?;
            element = element_of(cx, current)?;
        }
        if steps > 0 {
            log::trace!("{}: obtuse chain {node} -> {current} in {steps} step(s)", cx.id());
        }

        self.center = element.center();
        self.dim = element.dim();
        self.anchor = Some(Anchor {
            node: current,
            element,
        });
        self.pre.push(current);
        self.frontier.push(current);
        Ok(())
    }

    /// Grows the cavity depth-first until the frontier is empty.
    ///
    /// After a re-anchor the elements of the abandoned cavity are not
    /// revisited; growth continues from the new anchor only.
    pub fn build(&mut self, cx: &mut IterationContext<'_, Element>) -> Result<(), RefineError> {
        self.state = CavityState::Building;
        'drain: while let Some(curr) = self.frontier.pop() {
            for next in cx.neighbors(curr, MethodFlag::Write)? {
                if self.expand(curr, next, cx)? == Expansion::Reanchored {
                    self.state = CavityState::Building;
                    continue 'drain;
                }
            }
        }
        Ok(())
    }

    /// Classifies `next`, a neighbour of cavity element `node`.
    pub fn expand(
        &mut self,
        node: NodeId,
        next: NodeId,
        cx: &mut IterationContext<'_, Element>,
    ) -> Result<Expansion, RefineError> {
        let next_element = element_of(cx, next)?;
        // A segment-anchored cavity never swallows a second segment.
        let second_segment =
            self.dim == 2 && next_element.dim() == 2 && self.anchor() != Some(next);

        if !second_segment && next_element.in_circle(self.center) {
            if next_element.dim() == 2 && self.dim != 2 {
                log::trace!("{}: segment {next} encroached, re-anchoring", cx.id());
                self.initialize(next, cx)?;
                return Ok(Expansion::Reanchored);
            }
            if !self.pre.contains(&next) {
                self.pre.push(next);
                self.frontier.push(next);
            }
            return Ok(Expansion::Member);
        }

        let node_element = element_of(cx, node)?;
        let edge = next_element.related_edge(&node_element).ok_or_else(|| {
            RefineError::invariant(node, format!("neighbour {next} shares no side"))
        })?;
        let connection = Connection {
            src: node,
            dst: next,
            edge,
        };
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
        Ok(Expansion::Boundary)
    }

    /// Stages the replacement elements and the edges that will tie them in.
    pub fn compute_post(&mut self, cx: &mut IterationContext<'_, Element>) -> Result<(), RefineError> {
        self.state = CavityState::ComputingPost;
        let Some(anchor) = self.anchor.clone() else {
            return Ok(());
        };

        if anchor.element.dim() == 2 {
            self.post.push(Element::segment(self.center, anchor.element.point(0)));
            self.post.push(Element::segment(self.center, anchor.element.point(1)));
        }

        for i in 0..self.connections.len() {
            let conn = self.connections[i];
            let fresh = Element::triangle(self.center, conn.edge.point(0), conn.edge.point(1));
            if !(fresh.area() > 0.0) {
                return Err(RefineError::invariant(
                    anchor.node,
                    format!("replacement for side {:?} is degenerate", conn.edge),
                ));
            }

            let other = if self.pre.contains(&conn.dst) { conn.src } else { conn.dst };
            let other_element = element_of(cx, other)?;
            if !fresh.is_related(&other_element) {
                return Err(RefineError::invariant(
                    other,
                    "replacement does not share the boundary side",
                ));
            }

            let idx = self.post.len();
            self.post_edges.push(PostEdge {
                from: idx,
                to: PostEnd::Existing(other),
            });
            for (j, staged) in self.post.iter().enumerate() {
                if staged.is_related(&fresh) {
                    self.post_edges.push(PostEdge {
                        from: idx,
                        to: PostEnd::Staged(j),
                    });
                }
            }
            self.post.push(fresh);
        }
        Ok(())
    }

    /// Swaps `pre` for `post`. Must run after the cautious point.
    ///
    /// New bad elements are pushed to `cx`, as is `item` if it survived.
    pub fn update(&mut self, item: NodeId, cx: &mut IterationContext<'_, Element>) -> Result<(), RefineError> {
        self.state = CavityState::Updating;
        for &node in &self.pre {
            cx.remove_node(node, MethodFlag::Unprotected)?;
        }

        let mut created = Vec::with_capacity(self.post.len());
        for element in self.post.drain(..) {
            let bad = element.is_bad_below(self.min_angle);
            let id = cx.create_node(element);
            if bad {
                cx.push(id);
            }
            created.push(id);
        }

        for edge in &self.post_edges {
            let dst = match edge.to {
                PostEnd::Existing(node) => node,
                PostEnd::Staged(j) => created[j],
            };
            cx.add_edge(created[edge.from], dst, MethodFlag::Unprotected)?;
        }

        if cx.contains_node(item, MethodFlag::Unprotected)? {
            cx.push(item);
        }
        self.state = CavityState::Committed;
        Ok(())
    }
}

fn element_of(cx: &mut IterationContext<'_, Element>, node: NodeId) -> Result<Arc<Element>, RefineError> {
    cx.get_data(node, MethodFlag::Write)
}

/// Neighbour of the obtuse triangle `node` across the side opposite its obtuse angle.
fn opposite(node: NodeId, element: &Element, cx: &mut IterationContext<'_, Element>) -> Result<NodeId, RefineError> {
    let vertex = element
        .obtuse_vertex()
        .ok_or_else(|| RefineError::invariant(node, "opposite requested for a non-obtuse element"))?;
    let neighbors = cx.neighbors(node, MethodFlag::Write)?;
    if neighbors.len() != 3 {
        return Err(RefineError::invariant(
            node,
            format!("obtuse triangle has {} neighbours", neighbors.len()),
        ));
    }
    for next in neighbors {
        let other = element_of(cx, next)?;
        let edge = element.related_edge(&other).ok_or_else(|| {
            RefineError::invariant(node, format!("neighbour {next} shares no side"))
        })?;
        if !edge.contains(&vertex) {
            return Ok(next);
        }
    }
    Err(RefineError::invariant(node, "no neighbour opposite the obtuse angle"))
}
