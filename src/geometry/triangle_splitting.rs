// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle splitting along the intersection curve
//!
//! Every triangle the curve touches is retriangulated in its own plane:
//! curve points on its edges are inserted first (in the same order the
//! neighbouring triangle sees them, so the two sides stay conforming), then
//! interior curve points, and finally the curve segments are forced into the
//! triangulation with edge flips. Each local triangulation is validated
//! before it is accepted. A failure is reported as a degeneracy and
//! handled by the perturbation retry.

use super::attributes::{TriangleData, VertexData};
use super::curve::{CurveOrigin, IntersectionCurve};
use super::mesh::{Mesh, Triangle, Vertex};
use super::robust_predicates::{dominant_axis, orient2d_value, project};
use super::triangle_intersection::{edge_key, EdgeKey};
use crate::error::{CorkError, CorkResult};
use ahash::AHashMap;
use log::debug;
use nalgebra::{Point2, Point3};
use std::collections::{BTreeSet, VecDeque};

/// Triangulation of one input triangle in a local 2D frame
struct LocalTriangulation {
    /// Local vertex id to global vertex id
    global: Vec<usize>,
    points: Vec<Point2<f64>>,
    triangles: Vec<[usize; 3]>,
    /// Boundary edges of the original triangle, directed
    boundary: BTreeSet<(usize, usize)>,
    constraints: BTreeSet<(usize, usize)>,
    local: AHashMap<usize, usize>,
    /// Coordinate dropped by the projection
    axis: usize,
    /// Projected coordinates are swapped to make the input winding CCW
    axis_flip: bool,
}

impl LocalTriangulation {
    fn new(corners: [usize; 3], positions: &[Point3<f64>]) -> CorkResult<Self> {
        let [a, b, c] = corners.map(|i| positions[i]);
        let axis = dominant_axis(&(b - a).cross(&(c - a)));
        let mut triangulation = Self {
            global: Vec::new(),
            points: Vec::new(),
            triangles: Vec::new(),
            boundary: BTreeSet::new(),
            constraints: BTreeSet::new(),
            local: AHashMap::new(),
            axis,
            axis_flip: false,
        };
        for &g in &corners {
            triangulation.add_vertex(g, project(&positions[g], axis));
        }

        // Mirror the frame if needed so the input winding is counter-clockwise
        let orient = triangulation.orient(0, 1, 2);
        if orient == 0.0 {
            return Err(CorkError::degenerate());
        }
        triangulation.axis_flip = orient < 0.0;
        if triangulation.axis_flip {
            for p in &mut triangulation.points {
                *p = Point2::new(p.y, p.x);
            }
        }

        triangulation.triangles.push([0, 1, 2]);
        triangulation.boundary.extend([(0, 1), (1, 2), (2, 0)]);
        Ok(triangulation)
    }

    fn add_vertex(&mut self, global: usize, point: Point2<f64>) -> usize {
        let id = self.points.len();
        self.global.push(global);
        self.points.push(point);
        self.local.insert(global, id);
        id
    }

    fn add_global(&mut self, global: usize, positions: &[Point3<f64>]) -> usize {
        if let Some(&id) = self.local.get(&global) {
            return id;
        }
        let p = project(&positions[global], self.axis);
        let p = if self.axis_flip { Point2::new(p.y, p.x) } else { p };
        self.add_vertex(global, p)
    }

    fn orient(&self, a: usize, b: usize, c: usize) -> f64 {
        orient2d_value(&self.points[a], &self.points[b], &self.points[c])
    }

    /// Triangle holding directed edge a→b, rotated so it reads [a, b, opposite]
    fn triangle_with_edge(&self, a: usize, b: usize) -> Option<(usize, usize)> {
        self.triangles.iter().enumerate().find_map(|(i, t)| {
            (0..3)
                .find(|&k| t[k] == a && t[(k + 1) % 3] == b)
                .map(|k| (i, t[(k + 2) % 3]))
        })
    }

    fn has_edge(&self, a: usize, b: usize) -> bool {
        self.triangle_with_edge(a, b).is_some() || self.triangle_with_edge(b, a).is_some()
    }

    /// Put `p` on edge a–b, splitting the triangles on both sides
    fn split_edge(&mut self, a: usize, b: usize, p: usize) -> CorkResult<()> {
        let mut split_any = false;
        for (u, v) in [(a, b), (b, a)] {
            if let Some((i, opp)) = self.triangle_with_edge(u, v) {
                self.triangles[i] = [u, p, opp];
                self.triangles.push([p, v, opp]);
                split_any = true;
            }
        }
        if !split_any {
            return Err(CorkError::degenerate());
        }
        for (u, v) in [(a, b), (b, a)] {
            if self.boundary.remove(&(u, v)) {
                self.boundary.insert((u, p));
                self.boundary.insert((p, v));
            }
        }
        Ok(())
    }

    /// Insert a point strictly inside the original triangle
    fn insert_interior(&mut self, p: usize) -> CorkResult<()> {
        for i in 0..self.triangles.len() {
            let [a, b, c] = self.triangles[i];
            let o = [self.orient(a, b, p), self.orient(b, c, p), self.orient(c, a, p)];
            if o.iter().any(|&s| s < 0.0) {
                continue;
            }
            let zeros: Vec<usize> = (0..3).filter(|&k| o[k] == 0.0).collect();
            return match zeros.as_slice() {
                [] => {
                    self.triangles[i] = [a, b, p];
                    self.triangles.push([b, c, p]);
                    self.triangles.push([c, a, p]);
                    Ok(())
                }
                [k] => {
                    let t = self.triangles[i];
                    let (u, v) = (t[*k], t[(*k + 1) % 3]);
                    if self.boundary.contains(&(u, v)) {
                        Err(CorkError::degenerate())
                    } else {
                        self.split_edge(u, v, p)
                    }
                }
                _ => Err(CorkError::degenerate()),
            };
        }
        Err(CorkError::degenerate())
    }

    /// Undirected edges of the triangulation
    fn edges(&self) -> BTreeSet<(usize, usize)> {
        self.triangles
            .iter()
            .flat_map(|t| [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])])
            .map(|(u, v)| (u.min(v), u.max(v)))
            .collect()
    }

    /// Does edge u–v cross the open segment a–b at a single interior point?
    fn crosses(&self, a: usize, b: usize, u: usize, v: usize) -> bool {
        if u == a || u == b || v == a || v == b {
            return false;
        }
        let s1 = self.orient(a, b, u);
        let s2 = self.orient(a, b, v);
        let s3 = self.orient(u, v, a);
        let s4 = self.orient(u, v, b);
        s1 * s2 < 0.0 && s3 * s4 < 0.0
    }

    /// Force edge a–b into the triangulation by flipping the edges it crosses
    fn recover_constraint(&mut self, a: usize, b: usize, max_flips: usize) -> CorkResult<()> {
        let key = (a.min(b), a.max(b));
        if self.has_edge(a, b) {
            self.constraints.insert(key);
            return Ok(());
        }

        // A vertex lying on the open segment would split the constraint
        let (pa, pb) = (self.points[a], self.points[b]);
        for v in 0..self.points.len() {
            if v == a || v == b || self.orient(a, b, v) != 0.0 {
                continue;
            }
            let p = self.points[v];
            if (p - pa).dot(&(pb - pa)) > 0.0 && (p - pb).dot(&(pa - pb)) > 0.0 {
                return Err(CorkError::degenerate());
            }
        }

        // Two curve segments crossing inside one triangle only happen when an
        // operand passes through itself
        if self.constraints.iter().any(|&(u, v)| self.crosses(a, b, u, v)) {
            return Err(CorkError::SelfIntersectingInput);
        }

        let mut queue: VecDeque<(usize, usize)> = self
            .edges()
            .into_iter()
            .filter(|&(u, v)| self.crosses(a, b, u, v))
            .collect();

        let mut flips = 0;
        while let Some((u, v)) = queue.pop_front() {
            flips += 1;
            if flips > max_flips || self.constraints.contains(&(u.min(v), u.max(v))) {
                return Err(CorkError::degenerate());
            }

            let (Some((t1, x)), Some((t2, y))) = (self.triangle_with_edge(u, v), self.triangle_with_edge(v, u)) else {
                return Err(CorkError::degenerate());
            };

            // Flip only when the quad u, y, v, x is strictly convex
            if self.orient(x, y, u) * self.orient(x, y, v) >= 0.0 {
                queue.push_back((u, v));
                continue;
            }

            self.triangles[t1] = [x, u, y];
            self.triangles[t2] = [y, v, x];

            if self.crosses(a, b, x, y) {
                queue.push_back((x, y));
            }
        }

        if !self.has_edge(a, b) {
            return Err(CorkError::degenerate());
        }
        self.constraints.insert(key);
        Ok(())
    }

    fn validate(&self) -> CorkResult<()> {
        if self.triangles.iter().any(|&[a, b, c]| self.orient(a, b, c) <= 0.0) {
            return Err(CorkError::degenerate());
        }
        if self.constraints.iter().any(|&(a, b)| !self.has_edge(a, b)) {
            return Err(CorkError::degenerate());
        }
        Ok(())
    }
}

/// Retriangulate one triangle so that the given curve points and segments
/// become vertices and edges
///
/// `edge_points[i]` lists the global ids on the edge from `corners[i]` to
/// `corners[(i + 1) % 3]`, ordered in that direction. Returns the new
/// triangles as global index triples with the input winding.
pub fn split_triangle(
    positions: &[Point3<f64>],
    corners: [usize; 3],
    edge_points: [&[usize]; 3],
    interior: &[usize],
    segments: &[[usize; 2]],
    max_flips: usize,
) -> CorkResult<Vec<[usize; 3]>> {
    let mut tri = LocalTriangulation::new(corners, positions)?;

    for (i, points) in edge_points.iter().enumerate() {
        let end = (i + 1) % 3;
        let mut prev = i;
        for &g in points.iter() {
            let p = tri.add_global(g, positions);
            tri.split_edge(prev, end, p)?;
            prev = p;
        }
    }

    for &g in interior {
        if tri.local.contains_key(&g) {
            continue;
        }
        let p = tri.add_global(g, positions);
        tri.insert_interior(p)?;
    }

    for &[ga, gb] in segments {
        let (Some(&a), Some(&b)) = (tri.local.get(&ga), tri.local.get(&gb)) else {
            return Err(CorkError::degenerate());
        };
        tri.recover_constraint(a, b, max_flips)?;
    }

    tri.validate()?;
    Ok(tri
        .triangles
        .iter()
        .map(|t| t.map(|i| tri.global[i]))
        .collect())
}

/// Next generation of the working mesh with the curve made explicit
pub struct Subdivision<V, T> {
    pub mesh: Mesh<V, T>,
    /// Edges that lie on the intersection curve
    pub curve_edges: BTreeSet<EdgeKey>,
    /// First vertex id that belongs to the curve
    pub first_curve_vertex: usize,
}

/// Split every triangle the curve touches
///
/// Curve vertices are appended after the existing vertices. Their payload is
/// interpolated from the edge or triangle they were found on. New triangles
/// keep the provenance and label of their parent.
pub fn subdivide<V: VertexData, T: TriangleData>(
    working: &Mesh<V, T>,
    curve: &IntersectionCurve,
    max_flips: usize,
) -> CorkResult<Subdivision<V, T>> {
    let base = working.vertex_count();
    let mut mesh: Mesh<V, T> = Mesh::with_capacity(base + curve.vertices.len(), working.triangle_count());
    mesh.vertices.extend(working.vertices.iter().cloned());

    for cv in &curve.vertices {
        let data = match cv.origin {
            CurveOrigin::Edge { edge, t } => {
                V::interpolate_edge(&working.vertices[edge.0].data, &working.vertices[edge.1].data, t)
            }
            CurveOrigin::Triple { triangle, weights } => {
                let [a, b, c] = working.triangles[triangle].indices;
                V::interpolate_triple(
                    [&working.vertices[a].data, &working.vertices[b].data, &working.vertices[c].data],
                    weights,
                )
            }
        };
        mesh.add_vertex(Vertex::with_data(cv.position, data));
    }

    let positions = mesh.positions();
    let global = |id: usize| base + id;
    let mut curve_edges = BTreeSet::new();
    let mut split_count = 0;

    for (t, parent) in working.triangles.iter().enumerate() {
        if !curve.touches(t, &parent.indices) {
            mesh.add_triangle(parent.clone());
            continue;
        }
        split_count += 1;

        let [a, b, c] = parent.indices;
        let along = |u: usize, v: usize| -> Vec<usize> {
            let mut ids: Vec<usize> = curve
                .edge_points
                .get(&edge_key(u, v))
                .map(|list| list.iter().map(|&(_, id)| global(id)).collect())
                .unwrap_or_default();
            if u > v {
                ids.reverse();
            }
            ids
        };
        let edges = [along(a, b), along(b, c), along(c, a)];
        let interior: Vec<usize> = curve
            .interior_points
            .get(&t)
            .map(|ids| ids.iter().map(|&id| global(id)).collect())
            .unwrap_or_default();
        let segments: Vec<[usize; 2]> = curve
            .triangle_segments
            .get(&t)
            .map(|segs| segs.iter().map(|s| s.map(global)).collect())
            .unwrap_or_default();

        let pieces = split_triangle(
            &positions,
            parent.indices,
            [&edges[0], &edges[1], &edges[2]],
            &interior,
            &segments,
            max_flips,
        )?;

        for indices in pieces {
            mesh.add_triangle(Triangle {
                indices,
                provenance: parent.provenance,
                label: parent.label,
                data: T::subdivide(&parent.data),
            });
        }
        for s in &segments {
            curve_edges.insert(edge_key(s[0], s[1]));
        }
    }

    debug!(
        "subdivision: {} triangles split, {} -> {} triangles, {} curve edges",
        split_count,
        working.triangle_count(),
        mesh.triangle_count(),
        curve_edges.len()
    );

    Ok(Subdivision {
        mesh,
        curve_edges,
        first_curve_vertex: base,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
            // 3: on edge 0-1
            Point3::new(1.0, 0.0, 0.0),
            // 4, 5: interior
            Point3::new(1.2, 1.0, 0.0),
            Point3::new(2.0, 1.3, 0.0),
            // 6: on edge 1-2
            Point3::new(2.5, 1.5, 0.0),
        ]
    }

    fn signed_area(positions: &[Point3<f64>], t: &[usize; 3]) -> f64 {
        let [a, b, c] = t.map(|i| positions[i]);
        (b - a).cross(&(c - a)).z / 2.0
    }

    fn has_edge(tris: &[[usize; 3]], a: usize, b: usize) -> bool {
        tris.iter()
            .any(|t| (0..3).any(|k| (t[k], t[(k + 1) % 3]) == (a, b) || (t[k], t[(k + 1) % 3]) == (b, a)))
    }

    #[test]
    fn test_untouched_triangle_is_unchanged() {
        let p = positions();
        let tris = split_triangle(&p, [0, 1, 2], [&[], &[], &[]], &[], &[], 100).unwrap();
        assert_eq!(tris, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_split_with_curve_chain() {
        let p = positions();
        let tris = split_triangle(
            &p,
            [0, 1, 2],
            [&[3], &[6], &[]],
            &[4, 5],
            &[[3, 4], [4, 5], [5, 6]],
            1000,
        )
        .unwrap();

        // 2 interior + 5 boundary vertices
        assert_eq!(tris.len(), 2 * 2 + 5 - 2);
        for t in &tris {
            assert!(signed_area(&p, t) > 0.0, "triangle {:?} is not counter-clockwise", t);
        }
        let total: f64 = tris.iter().map(|t| signed_area(&p, t)).sum();
        assert!((total - 8.0).abs() < 1e-12);
        assert!(has_edge(&tris, 3, 4));
        assert!(has_edge(&tris, 4, 5));
        assert!(has_edge(&tris, 5, 6));
    }

    #[test]
    fn test_reversed_winding_is_preserved() {
        let p = positions();
        let tris = split_triangle(&p, [0, 2, 1], [&[], &[6], &[3]], &[4], &[[3, 4]], 1000).unwrap();
        for t in &tris {
            assert!(signed_area(&p, t) < 0.0);
        }
        assert!(has_edge(&tris, 3, 4));
    }

    #[test]
    fn test_constraint_requiring_flips() {
        // A fan of interior points forces the final constraint across
        // several existing edges
        let mut p = positions();
        p.push(Point3::new(0.5, 2.0, 0.0)); // 7
        p.push(Point3::new(2.9, 0.4, 0.0)); // 8
        let tris = split_triangle(&p, [0, 1, 2], [&[], &[], &[]], &[4, 5, 7, 8], &[[7, 8]], 1000).unwrap();
        assert!(has_edge(&tris, 7, 8));
        for t in &tris {
            assert!(signed_area(&p, t) > 0.0);
        }
        let total: f64 = tris.iter().map(|t| signed_area(&p, t)).sum();
        assert!((total - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_crossing_segments_report_self_intersection() {
        let mut p = positions();
        p.push(Point3::new(0.5, 2.0, 0.0)); // 7
        p.push(Point3::new(2.9, 0.4, 0.0)); // 8
        p.push(Point3::new(0.6, 0.4, 0.0)); // 9
        p.push(Point3::new(2.0, 1.7, 0.0)); // 10
        let result = split_triangle(
            &p,
            [0, 1, 2],
            [&[], &[], &[]],
            &[7, 8, 9, 10],
            &[[7, 8], [9, 10]],
            1000,
        );
        assert!(matches!(result, Err(CorkError::SelfIntersectingInput)));
    }

    #[test]
    fn test_point_on_original_edge_is_degenerate() {
        let p = positions();
        // Vertex 3 lies on edge 0-1 but is passed as interior
        let result = split_triangle(&p, [0, 1, 2], [&[], &[], &[]], &[3], &[], 100);
        assert!(matches!(result, Err(CorkError::DegenerateIntersection { .. })));
    }

    #[test]
    fn test_interior_point_on_internal_edge() {
        let mut p = positions();
        // Midpoint of the segment from vertex 4 to corner 2 once 4 is inserted
        p.push(Point3::new(0.6, 2.5, 0.0)); // 7
        let tris = split_triangle(&p, [0, 1, 2], [&[], &[], &[]], &[4, 7], &[], 100).unwrap();
        assert_eq!(tris.len(), 5);
        for t in &tris {
            assert!(signed_area(&p, t) > 0.0);
        }
    }
}
