use amorph_refine::geometry::{Edge, Element, OBTUSE_ANGLE, Tuple};
use amorph_refine::mesh::Mesh;
use amorph_refine::refine::{RefineConfig, refine};
use proptest::prelude::*;

fn point() -> impl Strategy<Value = Tuple> {
    (-100.0..100.0f64, -100.0..100.0f64).prop_map(|(x, y)| Tuple::new(x, y))
}

fn triangle() -> impl Strategy<Value = (Tuple, Tuple, Tuple)> {
    (point(), point(), point()).prop_filter("non-degenerate", |(a, b, c)| Tuple::orient(a, b, c).abs() > 10.0)
}

proptest! {
    #[test]
    fn circumcenter_is_equidistant((a, b, c) in triangle()) {
        let o = Tuple::circumcenter(&a, &b, &c);
        let r = o.distance(&a);
        let tol = 1e-7 * (1.0 + r);
        prop_assert!((o.distance(&b) - r).abs() < tol);
        prop_assert!((o.distance(&c) - r).abs() < tol);
    }

    #[test]
    fn interior_angles_sum_to_half_a_turn((a, b, c) in triangle()) {
        let sum = Tuple::angle(&b, &a, &c) + Tuple::angle(&a, &b, &c) + Tuple::angle(&a, &c, &b);
        prop_assert!((sum - 180.0).abs() < 1e-6);
    }

    #[test]
    fn obtuse_and_bad_flags_agree_with_angles((a, b, c) in triangle()) {
        let e = Element::triangle(a, b, c);
        let angles = [Tuple::angle(&b, &a, &c), Tuple::angle(&a, &b, &c), Tuple::angle(&a, &c, &b)];
        let max = angles.iter().cloned().fold(f64::MIN, f64::max);
        let min = angles.iter().cloned().fold(f64::MAX, f64::min);
        prop_assert_eq!(e.is_obtuse(), max > OBTUSE_ANGLE);
        prop_assert_eq!(e.is_bad(), min < 30.0);
        prop_assert!(min <= 60.0 + 1e-9);
    }

    #[test]
    fn edges_ignore_orientation(a in point(), b in point()) {
        let e = Edge::new(a, b);
        prop_assert_eq!(e, Edge::new(b, a));
        prop_assert!(e.contains(&a) && e.contains(&b));
        prop_assert!(e.point(0).lex_cmp(&e.point(1)).is_le());
    }

    #[test]
    fn neighbours_share_their_common_side((a, b, c) in triangle(), d in point()) {
        let left = Element::triangle(a, b, c);
        let right = Element::triangle(b, a, d);
        prop_assert_eq!(left.related_edge(&right), Some(Edge::new(a, b)));
        prop_assert!(left.is_related(&Element::segment(c, b)));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn stretched_grids_refine_to_quality(
        nx in 1..=5usize,
        ny in 1..=4usize,
        cell in prop::sample::select(vec![(1.0, 0.4), (1.0, 0.3), (0.4, 1.0), (2.0, 0.5), (1.0, 0.2)]),
        threads in 1..=3usize,
    ) {
        let (w, h) = (cell.0 * nx as f64, cell.1 * ny as f64);
        let mut mesh = Mesh::rectangle(nx, ny, w, h).unwrap();
        let cfg = RefineConfig { threads, iteration_limit: Some(50_000), ..RefineConfig::default() };
        let report = refine(&mut mesh, &cfg).unwrap();
        prop_assert_eq!(report.initial_bad, 2 * nx * ny);
        prop_assert_eq!(report.after.bad, 0);
        prop_assert!((report.after.area - w * h).abs() < 1e-9 * w * h);
    }
}
