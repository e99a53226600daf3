// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Intersection curve assembly
//!
//! Candidate pairs are intersected independently, possibly on the rayon
//! pool, and the piercings are then collected into ordered maps keyed by
//! what produced them. Curve vertex ids follow key order, so the curve
//! does not depend on thread scheduling.

use super::robust_predicates::{barycentric, orient3d_value, plane_meeting_point, triangle_triple_intersect, Crossing};
use super::triangle_intersection::{edge_key, intersect_pair, EdgeHit, EdgeKey, PairIntersection};
use crate::error::{CorkError, CorkResult};
use log::debug;
use nalgebra::Point3;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// What produced a curve vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CurvePointKey {
    /// An edge piercing a triangle
    EdgeTriangle { edge: EdgeKey, triangle: usize },
    /// Three mutually crossing triangles, sorted
    Triple([usize; 3]),
}

/// How to derive attributes for a curve vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveOrigin {
    Edge { edge: EdgeKey, t: f64 },
    Triple { triangle: usize, weights: [f64; 3] },
}

#[derive(Debug, Clone)]
pub struct CurveVertex {
    pub key: CurvePointKey,
    pub position: Point3<f64>,
    pub origin: CurveOrigin,
}

/// Piece of the curve lying on two triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveSegment {
    pub triangles: (usize, usize),
    pub ends: [usize; 2],
}

/// Curve graph plus the per-edge and per-triangle views the subdivider needs
#[derive(Debug, Clone, Default)]
pub struct IntersectionCurve {
    pub vertices: Vec<CurveVertex>,
    pub segments: Vec<CurveSegment>,
    /// Curve vertices on each input edge, sorted by parameter from `edge.0`
    pub edge_points: BTreeMap<EdgeKey, Vec<(f64, usize)>>,
    /// Curve vertices strictly inside each triangle
    pub interior_points: BTreeMap<usize, Vec<usize>>,
    /// Constraint segments per triangle
    pub triangle_segments: BTreeMap<usize, Vec<[usize; 2]>>,
}

impl IntersectionCurve {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Triangles the curve touches, either inside or along an edge
    pub fn touches(&self, triangle: usize, indices: &[usize; 3]) -> bool {
        if self.triangle_segments.contains_key(&triangle) || self.interior_points.contains_key(&triangle) {
            return true;
        }
        let [a, b, c] = *indices;
        [(a, b), (b, c), (c, a)]
            .iter()
            .any(|&(u, v)| self.edge_points.contains_key(&edge_key(u, v)))
    }

    /// Where every curve vertex lies on the unperturbed input
    ///
    /// A perturbed run only decides how the curve is connected. Each vertex
    /// is then put back where its edge meets the triangle's plane in `exact`.
    /// An edge lying in that plane keeps its perturbed parameter, and a
    /// triple point whose planes are parallel keeps its barycentric weights.
    pub fn exact_positions(&self, exact: &[Point3<f64>], triangles: &[[usize; 3]]) -> Vec<Point3<f64>> {
        let corners = |t: usize| triangles[t].map(|i| exact[i]);
        self.vertices
            .iter()
            .map(|vertex| match (vertex.key, vertex.origin) {
                (CurvePointKey::EdgeTriangle { edge, triangle }, CurveOrigin::Edge { t, .. }) => {
                    let (p, q) = (exact[edge.0], exact[edge.1]);
                    let [a, b, c] = corners(triangle);
                    let sp = orient3d_value(&a, &b, &c, &p);
                    let sq = orient3d_value(&a, &b, &c, &q);
                    let s = if sp == sq { t } else { (sp / (sp - sq)).clamp(0.0, 1.0) };
                    p + (q - p) * s
                }
                (CurvePointKey::Triple([t, u, v]), CurveOrigin::Triple { triangle, weights }) => {
                    plane_meeting_point(&corners(t), &corners(u), &corners(v)).unwrap_or_else(|| {
                        let [a, b, c] = corners(triangle);
                        Point3::from(a.coords * weights[0] + b.coords * weights[1] + c.coords * weights[2])
                    })
                }
                _ => vertex.position,
            })
            .collect()
    }

    /// Build the curve from candidate pairs
    ///
    /// With `find_triples` set, points where three triangles meet are added
    /// and the segments through them are split there. Boolean operands are
    /// individually non-self-intersecting, so only resolve runs need this.
    pub fn build(
        positions: &[Point3<f64>],
        triangles: &[[usize; 3]],
        pairs: &[(usize, usize)],
        parallel: bool,
        find_triples: bool,
    ) -> CorkResult<Self> {
        let evaluate = |&(t, u): &(usize, usize)| ((t, u), intersect_pair(positions, triangles, t, u));
        let results: Vec<((usize, usize), PairIntersection)> = if parallel {
            pairs.par_iter().map(evaluate).collect()
        } else {
            pairs.iter().map(evaluate).collect()
        };

        let mut points: BTreeMap<CurvePointKey, (Point3<f64>, CurveOrigin)> = BTreeMap::new();
        let mut pair_ends: BTreeMap<(usize, usize), [CurvePointKey; 2]> = BTreeMap::new();

        for ((t, u), result) in results {
            match result {
                PairIntersection::Disjoint => {}
                PairIntersection::Degenerate => return Err(CorkError::degenerate()),
                PairIntersection::Segment(hits) => {
                    let keys = hits.map(|hit| {
                        let key = CurvePointKey::EdgeTriangle {
                            edge: hit.edge,
                            triangle: hit.triangle,
                        };
                        points.entry(key).or_insert_with(|| edge_point(positions, &hit));
                        key
                    });
                    pair_ends.insert((t.min(u), t.max(u)), keys);
                }
            }
        }

        let mut pair_triples: BTreeMap<(usize, usize), Vec<CurvePointKey>> = BTreeMap::new();
        if find_triples {
            for (triple, position) in find_triple_points(positions, triangles, &pair_ends)? {
                let [t, u, v] = triple;
                let key = CurvePointKey::Triple(triple);
                let weights = barycentric(&position, &triangles[t].map(|i| positions[i]));
                points.insert(key, (position, CurveOrigin::Triple { triangle: t, weights }));
                for pair in [(t, u), (t, v), (u, v)] {
                    pair_triples.entry(pair).or_default().push(key);
                }
            }
        }

        let mut curve = IntersectionCurve::default();
        let mut ids: BTreeMap<CurvePointKey, usize> = BTreeMap::new();
        for (key, (position, origin)) in points {
            ids.insert(key, curve.vertices.len());
            curve.vertices.push(CurveVertex { key, position, origin });
        }

        for (&(t, u), ends) in &pair_ends {
            let start = ids[&ends[0]];
            let end = ids[&ends[1]];
            let mut chain = vec![start];
            if let Some(triples) = pair_triples.get(&(t, u)) {
                chain.extend(order_along(&curve.vertices, start, end, triples.iter().map(|k| ids[k]))?);
            }
            chain.push(end);

            for w in chain.windows(2) {
                let segment = CurveSegment {
                    triangles: (t, u),
                    ends: [w[0], w[1]],
                };
                curve.triangle_segments.entry(t).or_default().push(segment.ends);
                curve.triangle_segments.entry(u).or_default().push(segment.ends);
                curve.segments.push(segment);
            }
        }

        for (id, vertex) in curve.vertices.iter().enumerate() {
            match vertex.key {
                CurvePointKey::EdgeTriangle { edge, triangle } => {
                    if let CurveOrigin::Edge { t, .. } = vertex.origin {
                        curve.edge_points.entry(edge).or_default().push((t, id));
                    }
                    curve.interior_points.entry(triangle).or_default().push(id);
                }
                CurvePointKey::Triple(tris) => {
                    for t in tris {
                        curve.interior_points.entry(t).or_default().push(id);
                    }
                }
            }
        }

        for list in curve.edge_points.values_mut() {
            list.sort_by(|a, b| a.0.total_cmp(&b.0));
            if list.windows(2).any(|w| w[0].0 >= w[1].0) {
                return Err(CorkError::degenerate());
            }
        }

        debug!(
            "intersection curve: {} candidate pairs, {} crossing pairs, {} vertices, {} segments",
            pairs.len(),
            pair_ends.len(),
            curve.vertices.len(),
            curve.segments.len()
        );

        Ok(curve)
    }
}

fn edge_point(positions: &[Point3<f64>], hit: &EdgeHit) -> (Point3<f64>, CurveOrigin) {
    let p = positions[hit.edge.0];
    let q = positions[hit.edge.1];
    (
        p + (q - p) * hit.t,
        CurveOrigin::Edge {
            edge: hit.edge,
            t: hit.t,
        },
    )
}

/// Every triple of mutually crossing triangles, with its meeting point
fn find_triple_points(
    positions: &[Point3<f64>],
    triangles: &[[usize; 3]],
    pair_ends: &BTreeMap<(usize, usize), [CurvePointKey; 2]>,
) -> CorkResult<Vec<([usize; 3], Point3<f64>)>> {
    let mut partners: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for &(t, u) in pair_ends.keys() {
        partners.entry(t).or_default().insert(u);
        partners.entry(u).or_default().insert(t);
    }

    let corners = |t: usize| triangles[t].map(|i| positions[i]);
    let mut found = Vec::new();
    for (&t, list) in &partners {
        for &u in list.range(t + 1..) {
            for &v in list.range(u + 1..) {
                if !partners.get(&u).is_some_and(|p| p.contains(&v)) {
                    continue;
                }
                match triangle_triple_intersect(&corners(t), &corners(u), &corners(v)) {
                    Crossing::Miss => {}
                    Crossing::Hit(p) => found.push(([t, u, v], p)),
                    Crossing::Degenerate => return Err(CorkError::degenerate()),
                }
            }
        }
    }
    Ok(found)
}

/// Sort interior curve vertices by their position along `start → end`
fn order_along(
    vertices: &[CurveVertex],
    start: usize,
    end: usize,
    interior: impl Iterator<Item = usize>,
) -> CorkResult<Vec<usize>> {
    let p0 = vertices[start].position;
    let dir = vertices[end].position - p0;
    let len2 = dir.norm_squared();
    if len2 == 0.0 {
        return Err(CorkError::degenerate());
    }

    let mut keyed: Vec<(f64, usize)> = interior
        .map(|id| ((vertices[id].position - p0).dot(&dir) / len2, id))
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let ordered = keyed.windows(2).all(|w| w[0].0 < w[1].0);
    let inside = keyed.iter().all(|(s, _)| *s > 0.0 && *s < 1.0);
    if !ordered || !inside {
        return Err(CorkError::degenerate());
    }
    Ok(keyed.into_iter().map(|(_, id)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two crossing triangles of different surfaces
    fn crossing() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.5, 0.5, -1.0),
            Point3::new(0.5, 0.5, 1.0),
            Point3::new(0.6, -1.0, 0.3),
        ];
        (positions, vec![[0, 1, 2], [3, 4, 5]])
    }

    #[test]
    fn test_single_segment() {
        let (positions, triangles) = crossing();
        let curve = IntersectionCurve::build(&positions, &triangles, &[(0, 1)], false, false).unwrap();

        assert_eq!(curve.vertices.len(), 2);
        assert_eq!(curve.segments.len(), 1);
        assert_eq!(curve.triangle_segments[&0], curve.triangle_segments[&1]);
        // One point on an edge of each triangle
        assert!(curve.edge_points.contains_key(&(0, 1)));
        assert!(curve.edge_points.contains_key(&(3, 4)));
        assert_eq!(curve.interior_points[&0].len(), 1);
        assert_eq!(curve.interior_points[&1].len(), 1);
        assert!(curve.touches(0, &triangles[0]));
    }

    #[test]
    fn test_parallel_build_matches_serial() {
        let (positions, triangles) = crossing();
        let serial = IntersectionCurve::build(&positions, &triangles, &[(0, 1)], false, false).unwrap();
        let parallel = IntersectionCurve::build(&positions, &triangles, &[(0, 1)], true, false).unwrap();
        assert_eq!(serial.segments, parallel.segments);
        let keys = |c: &IntersectionCurve| c.vertices.iter().map(|v| v.key).collect::<Vec<_>>();
        assert_eq!(keys(&serial), keys(&parallel));
    }

    #[test]
    fn test_exact_positions_undo_a_perturbation() {
        let (positions, triangles) = crossing();
        let nudge = nalgebra::Vector3::new(1e-7, -2e-7, 3e-7);
        let moved: Vec<Point3<f64>> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| if i >= 3 { p + nudge } else { *p })
            .collect();

        let exact = IntersectionCurve::build(&positions, &triangles, &[(0, 1)], false, false).unwrap();
        let perturbed = IntersectionCurve::build(&moved, &triangles, &[(0, 1)], false, false).unwrap();
        let restored = perturbed.exact_positions(&positions, &triangles);

        assert_eq!(restored.len(), exact.vertices.len());
        for (vertex, position) in exact.vertices.iter().zip(&restored) {
            assert!((vertex.position - position).norm() < 1e-14);
        }
        let drift = exact
            .vertices
            .iter()
            .zip(&perturbed.vertices)
            .map(|(e, p)| (e.position - p.position).norm())
            .fold(0.0, f64::max);
        assert!(drift > 1e-9);
    }

    #[test]
    fn test_triple_point_splits_segments() {
        // Three axis-aligned triangles meeting at (0.25, 0.25, 0)
        let mut positions = Vec::new();
        let mut triangles = Vec::new();
        let planes: [[Point3<f64>; 3]; 3] = [
            [
                Point3::new(-1.0, -1.1, 0.0),
                Point3::new(2.3, -1.1, 0.0),
                Point3::new(-1.0, 2.2, 0.0),
            ],
            [
                Point3::new(0.25, -1.3, -1.2),
                Point3::new(0.25, 2.4, -1.2),
                Point3::new(0.25, -1.3, 2.6),
            ],
            [
                Point3::new(-1.4, 0.25, -0.9),
                Point3::new(-1.4, 0.25, 2.1),
                Point3::new(2.2, 0.25, -0.9),
            ],
        ];
        for tri in planes {
            let base = positions.len();
            positions.extend(tri);
            triangles.push([base, base + 1, base + 2]);
        }

        let pairs = [(0, 1), (0, 2), (1, 2)];
        let curve = IntersectionCurve::build(&positions, &triangles, &pairs, false, true).unwrap();

        let triples: Vec<_> = curve
            .vertices
            .iter()
            .filter(|v| matches!(v.key, CurvePointKey::Triple(_)))
            .collect();
        assert_eq!(triples.len(), 1);
        // Each of the three crossing segments is split in two
        assert_eq!(curve.segments.len(), 6);
        for t in 0..3 {
            assert_eq!(curve.triangle_segments[&t].len(), 4);
        }
    }
}
