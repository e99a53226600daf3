// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Robust geometric predicates for Boolean operations
//!
//! Orientation signs come from Shewchuk's adaptive-precision `orient3d` and
//! `orient2d`, so the sign is exact for the given f64 inputs. Every
//! topological decision goes through these two functions. A zero sign is
//! never guessed at: the callers report [`Crossing::Degenerate`] and the
//! pipeline retries with perturbed coordinates.
//!
//! Planar tests project onto the coordinate plane that drops the dominant
//! axis of the triangle normal. Dropping a coordinate is exact, so the 2D
//! signs agree with the 3D ones.

use crate::config::TRIPLE_POINT_TOLERANCE;
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use robust::{orient2d, orient3d, Coord, Coord3D};

/// Sign of an orientation determinant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Negative,
    Zero,
    Positive,
}

impl Sign {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Sign::Positive
        } else if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Zero
        }
    }

    pub fn is_zero(self) -> bool {
        self == Sign::Zero
    }
}

/// Outcome of an exact crossing test
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crossing<P> {
    Miss,
    Hit(P),
    /// Inputs are not in general position
    Degenerate,
}

impl<P> Crossing<P> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Crossing::Hit(_))
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Crossing::Degenerate)
    }
}

/// Location of a coplanar point relative to a triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLocation {
    Outside,
    Inside,
    Boundary,
}

fn coord3(p: &Point3<f64>) -> Coord3D<f64> {
    Coord3D {
        x: p.x,
        y: p.y,
        z: p.z,
    }
}

fn coord2(p: &Point2<f64>) -> Coord<f64> {
    Coord { x: p.x, y: p.y }
}

/// Six times the signed volume of tetrahedron (a, b, c, d).
/// Positive when `d` lies on the side the counter-clockwise normal of
/// (a, b, c) points to. The sign is exact; the magnitude is approximate.
pub fn orient3d_value(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    // robust reports "d below the plane" as positive
    -orient3d(coord3(a), coord3(b), coord3(c), coord3(d))
}

/// Exact orientation of `d` relative to the plane through (a, b, c)
pub fn orientation3(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> Sign {
    Sign::of(orient3d_value(a, b, c, d))
}

/// Twice the signed area of (a, b, c); positive when counter-clockwise
pub fn orient2d_value(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    orient2d(coord2(a), coord2(b), coord2(c))
}

pub fn orientation2(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Sign {
    Sign::of(orient2d_value(a, b, c))
}

/// Axis with the largest normal component
pub fn dominant_axis(normal: &Vector3<f64>) -> usize {
    normal.iamax()
}

/// Drop one coordinate, keeping the other two in cyclic order so that the
/// 2D orientation equals the sign of the dropped normal component
pub fn project(p: &Point3<f64>, drop_axis: usize) -> Point2<f64> {
    match drop_axis {
        0 => Point2::new(p.y, p.z),
        1 => Point2::new(p.z, p.x),
        _ => Point2::new(p.x, p.y),
    }
}

/// Projection plane for a triangle plus the factor that makes its
/// projected corners counter-clockwise. `None` for a degenerate triangle.
fn planar_frame(tri: &[Point3<f64>; 3]) -> Option<(usize, f64)> {
    let normal = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
    let axis = dominant_axis(&normal);
    let [a, b, c] = tri.map(|p| project(&p, axis));
    match orientation2(&a, &b, &c) {
        Sign::Positive => Some((axis, 1.0)),
        Sign::Negative => Some((axis, -1.0)),
        Sign::Zero => None,
    }
}

/// Locate a point assumed to lie in the plane of `tri`
pub fn point_in_triangle(p: &Point3<f64>, tri: &[Point3<f64>; 3]) -> PointLocation {
    let Some((axis, orient)) = planar_frame(tri) else {
        return PointLocation::Outside;
    };
    let [a, b, c] = tri.map(|v| project(&v, axis));
    let q = project(p, axis);
    point_in_triangle_2d(&q, &[a, b, c], orient)
}

fn point_in_triangle_2d(p: &Point2<f64>, tri: &[Point2<f64>; 3], orient: f64) -> PointLocation {
    let mut on_edge = false;
    for i in 0..3 {
        let s = orient2d_value(&tri[i], &tri[(i + 1) % 3], p) * orient;
        if s < 0.0 {
            return PointLocation::Outside;
        }
        if s == 0.0 {
            on_edge = true;
        }
    }
    if on_edge {
        PointLocation::Boundary
    } else {
        PointLocation::Inside
    }
}

/// Closed segment/segment test in 2D, touching counts
fn segments_touch_2d(p: &Point2<f64>, q: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> bool {
    let o1 = orientation2(p, q, a);
    let o2 = orientation2(p, q, b);
    let o3 = orientation2(a, b, p);
    let o4 = orientation2(a, b, q);

    if o1 != o2 && o3 != o4 && !o1.is_zero() && !o2.is_zero() && !o3.is_zero() && !o4.is_zero() {
        return true;
    }

    let within = |s: &Point2<f64>, e: &Point2<f64>, x: &Point2<f64>| {
        x.x >= s.x.min(e.x) && x.x <= s.x.max(e.x) && x.y >= s.y.min(e.y) && x.y <= s.y.max(e.y)
    };
    (o1.is_zero() && within(p, q, a))
        || (o2.is_zero() && within(p, q, b))
        || (o3.is_zero() && within(a, b, p))
        || (o4.is_zero() && within(a, b, q))
}

/// Segment lying in the plane of `tri`: does it touch the closed triangle?
fn coplanar_segment_touches(p: &Point3<f64>, q: &Point3<f64>, tri: &[Point3<f64>; 3]) -> bool {
    let Some((axis, orient)) = planar_frame(tri) else {
        return false;
    };
    let t2 = tri.map(|v| project(&v, axis));
    let (p2, q2) = (project(p, axis), project(q, axis));

    if point_in_triangle_2d(&p2, &t2, orient) != PointLocation::Outside
        || point_in_triangle_2d(&q2, &t2, orient) != PointLocation::Outside
    {
        return true;
    }
    (0..3).any(|i| segments_touch_2d(&p2, &q2, &t2[i], &t2[(i + 1) % 3]))
}

/// Does segment (p, q) pierce triangle `tri`?
///
/// A hit carries the parameter `t` in (0, 1) of the crossing along p→q.
/// Touching the triangle at an endpoint, an edge or a corner, and any
/// coplanar contact, is reported as degenerate.
pub fn segment_triangle_intersect(p: &Point3<f64>, q: &Point3<f64>, tri: &[Point3<f64>; 3]) -> Crossing<f64> {
    let [a, b, c] = tri;
    let sp = orient3d_value(a, b, c, p);
    let sq = orient3d_value(a, b, c, q);

    match (Sign::of(sp), Sign::of(sq)) {
        (Sign::Zero, Sign::Zero) => {
            if coplanar_segment_touches(p, q, tri) {
                Crossing::Degenerate
            } else {
                Crossing::Miss
            }
        }
        (Sign::Zero, _) => match point_in_triangle(p, tri) {
            PointLocation::Outside => Crossing::Miss,
            _ => Crossing::Degenerate,
        },
        (_, Sign::Zero) => match point_in_triangle(q, tri) {
            PointLocation::Outside => Crossing::Miss,
            _ => Crossing::Degenerate,
        },
        (s1, s2) if s1 == s2 => Crossing::Miss,
        _ => {
            let e = [
                orientation3(p, q, a, b),
                orientation3(p, q, b, c),
                orientation3(p, q, c, a),
            ];
            let has_pos = e.contains(&Sign::Positive);
            let has_neg = e.contains(&Sign::Negative);
            let has_zero = e.contains(&Sign::Zero);

            if has_pos && has_neg {
                Crossing::Miss
            } else if has_zero {
                Crossing::Degenerate
            } else {
                Crossing::Hit(sp / (sp - sq))
            }
        }
    }
}

/// Barycentric coordinates of a point in the plane of `tri`
pub fn barycentric(p: &Point3<f64>, tri: &[Point3<f64>; 3]) -> [f64; 3] {
    let normal = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
    let axis = dominant_axis(&normal);
    let [a, b, c] = tri.map(|v| project(&v, axis));
    let q = project(p, axis);
    let area = |u: &Point2<f64>, v: &Point2<f64>, w: &Point2<f64>| {
        (v.x - u.x) * (w.y - u.y) - (v.y - u.y) * (w.x - u.x)
    };
    let total = area(&a, &b, &c);
    if total == 0.0 {
        return [1.0 / 3.0; 3];
    }
    [
        area(&q, &b, &c) / total,
        area(&a, &q, &c) / total,
        area(&a, &b, &q) / total,
    ]
}

/// Common point of the supporting planes of three triangles, or `None` when
/// two of the planes are (nearly) parallel
pub fn plane_meeting_point(
    t0: &[Point3<f64>; 3],
    t1: &[Point3<f64>; 3],
    t2: &[Point3<f64>; 3],
) -> Option<Point3<f64>> {
    let plane = |t: &[Point3<f64>; 3]| {
        let n = (t[1] - t[0]).cross(&(t[2] - t[0]));
        (n, n.dot(&t[0].coords))
    };
    let (n0, d0) = plane(t0);
    let (n1, d1) = plane(t1);
    let (n2, d2) = plane(t2);

    let m = Matrix3::from_rows(&[n0.transpose(), n1.transpose(), n2.transpose()]);
    let scale = n0.norm() * n1.norm() * n2.norm();
    if scale == 0.0 || m.determinant().abs() <= 1e-12 * scale {
        return None;
    }
    m.lu().solve(&Vector3::new(d0, d1, d2)).map(Point3::from)
}

/// Three points on one line, decided exactly from the three axis projections
pub fn collinear(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> bool {
    (0..3).all(|axis| orient2d_value(&project(a, axis), &project(b, axis), &project(c, axis)) == 0.0)
}

/// Common point of three triangles, if they meet in a single interior point
///
/// The point is found by intersecting the three supporting planes. Points
/// within [`TRIPLE_POINT_TOLERANCE`] (barycentric) of any triangle boundary
/// cannot be placed reliably and are reported as degenerate.
pub fn triangle_triple_intersect(
    t0: &[Point3<f64>; 3],
    t1: &[Point3<f64>; 3],
    t2: &[Point3<f64>; 3],
) -> Crossing<Point3<f64>> {
    let Some(point) = plane_meeting_point(t0, t1, t2) else {
        return Crossing::Degenerate;
    };

    let mut degenerate = false;
    for tri in [t0, t1, t2] {
        let w = barycentric(&point, tri);
        let min = w.iter().copied().fold(f64::INFINITY, f64::min);
        if min < -TRIPLE_POINT_TOLERANCE {
            return Crossing::Miss;
        }
        if min <= TRIPLE_POINT_TOLERANCE {
            degenerate = true;
        }
    }

    if degenerate {
        Crossing::Degenerate
    } else {
        Crossing::Hit(point)
    }
}
