#![allow(dead_code)]
use amorph_refine::geometry::Tuple;
use amorph_refine::mesh::Mesh;
use amorph_refine::mesh::MeshSummary;

/// Points and triangles of a four-triangle patch translated by `(dx, dy)`.
///
/// The top triangle is flat and obtuse at its apex; refining it walks across
/// the side opposite that angle into the triangle below and fans both out
/// around that triangle's circumcentre.
pub fn gadget_at(dx: f64, dy: f64) -> (Vec<Tuple>, Vec<[usize; 3]>) {
    let pts = [
        (0.0, 0.0),
        (2.0, 0.0),
        (1.0, 0.3),
        (1.0, -1.5),
        (-1.0, -1.5),
        (3.0, -1.5),
    ]
    .iter()
    .map(|&(x, y)| Tuple::new(x + dx, y + dy))
    .collect();
    (pts, vec![[0, 1, 2], [0, 1, 3], [0, 3, 4], [1, 5, 3]])
}

pub fn gadget() -> Mesh {
    let (pts, tris) = gadget_at(0.0, 0.0);
    Mesh::from_triangles(&pts, &tris).unwrap()
}

/// Two gadgets far enough apart that their cavities can never meet.
pub fn islands() -> Mesh {
    let (mut pts, mut tris) = gadget_at(0.0, 0.0);
    let (far_pts, far_tris) = gadget_at(1000.0, -1000.0);
    let offset = pts.len();
    pts.extend(far_pts);
    tris.extend(far_tris.into_iter().map(|t| t.map(|i| i + offset)));
    Mesh::from_triangles(&pts, &tris).unwrap()
}

pub fn shape(s: &MeshSummary) -> (usize, usize, usize) {
    (s.triangles, s.segments, s.bad)
}

pub fn assert_close(got: f64, want: f64) {
    assert!((got - want).abs() < 1e-9 * want.abs().max(1.0), "got {got}, want {want}");
}
