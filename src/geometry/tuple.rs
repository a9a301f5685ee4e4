//! Planar coordinates.
//!
//! A [`Tuple`] is an immutable point `(x, y)` carrying an optional third
//! component (a weight, zero by default) that travels with the point but does
//! not take part in planar predicates. Tuples are copied by value and compared
//! exactly; there is no tolerance in equality, because mesh vertices are
//! shared bit-for-bit between the elements that reference them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, Mul, Sub};

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    coords: [f64; 3],
}

impl Tuple {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            coords: [x, y, 0.0],
        }
    }

    pub const fn with_weight(x: f64, y: f64, w: f64) -> Self {
        Self { coords: [x, y, w] }
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.coords[0]
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.coords[1]
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.coords[2]
    }

    pub fn dot(&self, other: &Tuple) -> f64 {
        self.x() * other.x() + self.y() * other.y()
    }

    pub fn distance_squared(&self, other: &Tuple) -> f64 {
        let d = *self - *other;
        d.dot(&d)
    }

    pub fn distance(&self, other: &Tuple) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn midpoint(&self, other: &Tuple) -> Tuple {
        (*self + *other) * 0.5
    }

    /// Angle at `b` between `a` and `c`, in degrees.
    pub fn angle(a: &Tuple, b: &Tuple, c: &Tuple) -> f64 {
        let u = *a - *b;
        let v = *c - *b;
        let denom = (u.dot(&u) * v.dot(&v)).sqrt();
        if denom == 0.0 {
            return 0.0;
        }
        (u.dot(&v) / denom).clamp(-1.0, 1.0).acos().to_degrees()
    }

    /// Twice the signed area of `abc`; positive when counter-clockwise.
    pub fn orient(a: &Tuple, b: &Tuple, c: &Tuple) -> f64 {
        (b.x() - a.x()) * (c.y() - a.y()) - (b.y() - a.y()) * (c.x() - a.x())
    }

    /// Centre of the circle through `a`, `b` and `c`.
    ///
    /// Collinear input has no circumcircle; the result is then non-finite.
    pub fn circumcenter(a: &Tuple, b: &Tuple, c: &Tuple) -> Tuple {
        let b = *b - *a;
        let c = *c - *a;
        let d = 2.0 * (b.x() * c.y() - b.y() * c.x());
        let bb = b.dot(&b);
        let cc = c.dot(&c);
        let ux = (c.y() * bb - b.y() * cc) / d;
        let uy = (b.x() * cc - c.x() * bb) / d;
        Tuple::new(a.x() + ux, a.y() + uy)
    }

    /// Lexicographic order on `(x, y, weight)`, total over all floats.
    pub fn lex_cmp(&self, other: &Tuple) -> Ordering {
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| a.total_cmp(b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl Add for Tuple {
    type Output = Tuple;

    fn add(self, rhs: Tuple) -> Tuple {
        Tuple::with_weight(self.x() + rhs.x(), self.y() + rhs.y(), self.weight() + rhs.weight())
    }
}

impl Sub for Tuple {
    type Output = Tuple;

    fn sub(self, rhs: Tuple) -> Tuple {
        Tuple::with_weight(self.x() - rhs.x(), self.y() - rhs.y(), self.weight() - rhs.weight())
    }
}

impl Mul<f64> for Tuple {
    type Output = Tuple;

    fn mul(self, s: f64) -> Tuple {
        Tuple::with_weight(self.x() * s, self.y() * s, self.weight() * s)
    }
}
